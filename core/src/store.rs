/// The store contract: an ordered collection of units with parse/serialize.
///
/// Concrete stores keep their units in a [`StoreCore`] and implement the
/// per-format parts (parsing, serialization, appending native units). Lookup,
/// statistics and cross-format copying are provided here once.
use crate::config::ParseOptions;
use crate::encoding::{self, Encoding, Newline};
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::unit::{copy_unit, TranslationUnit};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// File-level metadata carried by every store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetadata {
    pub encoding: Encoding,
    pub newline: Newline,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub filename: Option<String>,
}

impl StoreMetadata {
    /// Seed languages and filename from parse hints, keeping values already set.
    pub fn apply_options(&mut self, options: &ParseOptions) {
        if options.source_language.is_some() {
            self.source_language = options.source_language.clone();
        }
        if options.target_language.is_some() {
            self.target_language = options.target_language.clone();
        }
        if options.filename.is_some() {
            self.filename = options.filename.clone();
        }
    }
}

/// Recoverable findings from a successful parse.
#[derive(Debug, Default)]
pub struct ParseReport {
    pub warnings: Vec<StoreError>,
}

impl ParseReport {
    /// Total number of surplus units sharing an identity.
    pub fn duplicate_count(&self) -> usize {
        self.warnings
            .iter()
            .map(|warning| match warning {
                StoreError::DuplicateIdentity { count, .. } => count - 1,
                _ => 0,
            })
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Source, location and id lookup tables. First unit wins for sources and ids;
/// a location claimed by several units maps to nothing.
#[derive(Debug, Default)]
pub struct StoreIndex {
    by_source: HashMap<String, usize>,
    by_location: HashMap<String, Option<usize>>,
    by_id: HashMap<String, usize>,
}

impl StoreIndex {
    pub fn build<'a>(units: impl Iterator<Item = &'a dyn TranslationUnit>) -> Self {
        let mut index = Self::default();
        for (position, unit) in units.enumerate() {
            for form in unit.source().strings() {
                index.by_source.entry(form.clone()).or_insert(position);
            }
            for location in unit.locations() {
                index
                    .by_location
                    .entry(location)
                    .and_modify(|slot| *slot = None)
                    .or_insert(Some(position));
            }
            for id in unit.child_ids() {
                index.by_id.entry(id).or_insert(position);
            }
        }
        index
    }

    pub fn source(&self, source: &str) -> Option<usize> {
        self.by_source.get(source).copied()
    }

    pub fn location(&self, location: &str) -> Option<usize> {
        self.by_location.get(location).copied().flatten()
    }

    pub fn id(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }
}

/// Unit storage shared by all concrete stores.
#[derive(Debug)]
pub struct StoreCore<U> {
    pub units: Vec<U>,
    pub metadata: StoreMetadata,
    index: OnceCell<StoreIndex>,
}

impl<U> Default for StoreCore<U> {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            metadata: StoreMetadata::default(),
            index: OnceCell::new(),
        }
    }
}

impl<U: TranslationUnit> StoreCore<U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: U) -> usize {
        self.units.push(unit);
        self.index.take();
        self.units.len() - 1
    }

    /// Drop all units, keeping metadata.
    pub fn clear(&mut self) {
        self.units.clear();
        self.index.take();
    }

    pub fn index(&self) -> &StoreIndex {
        self.index.get_or_init(|| {
            StoreIndex::build(self.units.iter().map(|unit| unit as &dyn TranslationUnit))
        })
    }

    pub fn invalidate_index(&mut self) {
        self.index.take();
    }

    /// Collect duplicate identities as warnings and log them.
    pub fn check_duplicates(&self, format: FileFormat) -> ParseReport {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order = Vec::new();
        for unit in self.units.iter().filter(|u| !u.is_header() && !u.is_blank()) {
            let id = unit.id();
            let count = counts.entry(id.clone()).or_insert(0);
            if *count == 0 {
                order.push(id);
            }
            *count += 1;
        }

        let warnings: Vec<StoreError> = order
            .into_iter()
            .filter_map(|id| {
                let count = counts[&id];
                (count > 1).then_some(StoreError::DuplicateIdentity { id, count })
            })
            .collect();
        for warning in &warnings {
            log::warn!("{} store: {}", format, warning);
        }
        ParseReport { warnings }
    }
}

/// Implements the storage accessors of [`TranslationStore`] for a type with a
/// `core: StoreCore<_>` field.
macro_rules! delegate_store_core {
    () => {
        fn metadata(&self) -> &$crate::store::StoreMetadata {
            &self.core.metadata
        }

        fn metadata_mut(&mut self) -> &mut $crate::store::StoreMetadata {
            &mut self.core.metadata
        }

        fn unit_count(&self) -> usize {
            self.core.units.len()
        }

        fn unit(&self, index: usize) -> Option<&dyn $crate::unit::TranslationUnit> {
            self.core
                .units
                .get(index)
                .map(|unit| unit as &dyn $crate::unit::TranslationUnit)
        }

        fn unit_mut(&mut self, index: usize) -> Option<&mut dyn $crate::unit::TranslationUnit> {
            self.core
                .units
                .get_mut(index)
                .map(|unit| unit as &mut dyn $crate::unit::TranslationUnit)
        }

        fn index(&self) -> &$crate::store::StoreIndex {
            self.core.index()
        }

        fn invalidate_index(&mut self) {
            self.core.invalidate_index()
        }
    };
}

/// Unit counts by state. Headers and blank units are not counted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub translated: usize,
    pub fuzzy: usize,
    pub untranslated: usize,
    pub obsolete: usize,
}

pub trait TranslationStore: fmt::Debug {
    fn format(&self) -> FileFormat;

    fn metadata(&self) -> &StoreMetadata;

    fn metadata_mut(&mut self) -> &mut StoreMetadata;

    fn unit_count(&self) -> usize;

    fn unit(&self, index: usize) -> Option<&dyn TranslationUnit>;

    fn unit_mut(&mut self, index: usize) -> Option<&mut dyn TranslationUnit>;

    /// Lazily built lookup tables.
    fn index(&self) -> &StoreIndex;

    fn invalidate_index(&mut self);

    /// Append a native unit for `source`, returning its position.
    fn add_source_unit(&mut self, source: Multistring) -> usize;

    /// Replace the unit sequence with the content of `raw`.
    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError>;

    fn serialize(&self) -> Result<String, StoreError>;

    fn parse_bytes(&mut self, raw: &[u8], options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let (text, detected) = encoding::decode(raw)?;
        let report = self.parse(&text, options)?;
        let metadata = self.metadata_mut();
        metadata.encoding = detected;
        metadata.newline = Newline::detect(raw);
        Ok(report)
    }

    fn serialize_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let metadata = self.metadata();
        let text = metadata.newline.apply(&self.serialize()?);
        encoding::encode(&text, metadata.encoding)
    }

    /// True when there are no units, or only blank and header units.
    fn is_empty(&self) -> bool {
        (0..self.unit_count())
            .filter_map(|i| self.unit(i))
            .all(|unit| unit.is_blank() || unit.is_header())
    }

    /// Copy a unit from any store into a native unit of this one.
    fn add_unit_from(&mut self, other: &dyn TranslationUnit) -> usize {
        let position = self.add_source_unit(other.source());
        if let Some(unit) = self.unit_mut(position) {
            let id = other.id();
            if id != other.source().as_str() {
                unit.set_id(&id);
            }
            copy_unit(unit, other);
        }
        self.invalidate_index();
        position
    }

    /// `Key: Value` pairs of the store header; empty for headerless formats.
    fn header_fields(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn set_header_field(&mut self, _key: &str, _value: &str) {}

    /// Rebuild the lookup tables now.
    fn make_index(&mut self) {
        self.invalidate_index();
        self.index();
    }

    fn find_unit(&self, source: &str) -> Option<usize> {
        self.index().source(source)
    }

    fn find_id(&self, id: &str) -> Option<usize> {
        self.index().id(id)
    }

    fn find_location(&self, location: &str) -> Option<usize> {
        self.index().location(location)
    }

    /// Target of the unit translating `source`, if it is translated.
    fn translate(&self, source: &str) -> Option<Multistring> {
        let unit = self.unit(self.find_unit(source)?)?;
        if unit.is_translated() {
            unit.target()
        } else {
            None
        }
    }

    fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for unit in (0..self.unit_count()).filter_map(|i| self.unit(i)) {
            if unit.is_header() || unit.is_blank() {
                continue;
            }
            stats.total += 1;
            if unit.is_obsolete() {
                stats.obsolete += 1;
            } else if unit.is_translated() {
                stats.translated += 1;
            } else if unit.is_fuzzy() {
                stats.fuzzy += 1;
            } else {
                stats.untranslated += 1;
            }
        }
        stats
    }

    /// SHA-256 of the serialized content, hex encoded.
    fn fingerprint(&self) -> Result<String, StoreError> {
        let content = self.serialize()?;
        Ok(hex::encode(Sha256::digest(content.as_bytes())))
    }
}

impl<'s> dyn TranslationStore + 's {
    pub fn units(&self) -> impl Iterator<Item = &dyn TranslationUnit> + '_ {
        (0..self.unit_count()).filter_map(move |i| self.unit(i))
    }
}
