/// Haiku catkeys codec
///
/// A tab separated catalog: one header row
/// `version\tlanguage\tsignature\tchecksum`, then one row per string as
/// `source\tcontext\tcomment\ttranslation`.
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};

const FIELD_COUNT: usize = 4;

/// Escape tabs, newlines and backslashes for a catkeys field.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatkeysHeader {
    pub version: String,
    pub language: String,
    pub signature: String,
    pub checksum: String,
}

impl Default for CatkeysHeader {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            language: String::new(),
            signature: String::new(),
            checksum: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatkeysUnit {
    pub source: String,
    pub context: String,
    pub comment: String,
    pub target: String,
    obsolete: bool,
    errors: UnitErrors,
}

impl CatkeysUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    fn row(&self) -> String {
        [&self.source, &self.context, &self.comment, &self.target]
            .iter()
            .map(|field| escape(field))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

impl TranslationUnit for CatkeysUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.source.as_str())
    }

    fn set_source(&mut self, source: Multistring) {
        self.source = source.as_str().to_string();
    }

    fn target(&self) -> Option<Multistring> {
        if self.target.is_empty() {
            None
        } else {
            Some(Multistring::from(self.target.as_str()))
        }
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        self.target = target.map(|t| t.as_str().to_string()).unwrap_or_default();
    }

    fn id(&self) -> String {
        if self.context.is_empty() {
            self.source.clone()
        } else {
            format!("{}\u{4}{}", self.context, self.source)
        }
    }

    fn set_id(&mut self, id: &str) {
        if let Some((context, _)) = id.split_once('\u{4}') {
            self.context = context.to_string();
        }
    }

    fn context(&self) -> Option<String> {
        (!self.context.is_empty()).then(|| self.context.clone())
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => self.comment.clone(),
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        if self.comment.is_empty() {
            self.comment = text.to_string();
        } else {
            self.comment = format!("{}\n{}", self.comment, text);
        }
    }

    fn remove_notes(&mut self) {
        self.comment.clear();
    }

    fn is_obsolete(&self) -> bool {
        self.obsolete
    }

    fn make_obsolete(&mut self) {
        self.obsolete = true;
    }

    fn resurrect(&mut self) {
        self.obsolete = false;
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }
}

#[derive(Debug, Default)]
pub struct CatkeysStore {
    core: StoreCore<CatkeysUnit>,
    pub header: CatkeysHeader,
}

impl CatkeysStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[CatkeysUnit] {
        &self.core.units
    }
}

impl TranslationStore for CatkeysStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Catkeys
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(CatkeysUnit::new(source.as_str()))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);

        let mut lines = raw.lines().enumerate().filter(|(_, line)| !line.is_empty());
        let Some((_, header_line)) = lines.next() else {
            self.header = CatkeysHeader::default();
            return Ok(ParseReport::default());
        };

        let fields: Vec<&str> = header_line.split('\t').collect();
        if fields.len() != FIELD_COUNT {
            return Err(StoreError::parse(
                FileFormat::Catkeys,
                1,
                format!("header has {} fields, expected {}", fields.len(), FIELD_COUNT),
            ));
        }
        self.header = CatkeysHeader {
            version: fields[0].to_string(),
            language: fields[1].to_string(),
            signature: fields[2].to_string(),
            checksum: fields[3].to_string(),
        };
        if self.core.metadata.target_language.is_none() && !self.header.language.is_empty() {
            self.core.metadata.target_language = Some(self.header.language.clone());
        }

        for (number, line) in lines {
            let fields: Vec<String> = line.split('\t').map(unescape).collect();
            let [source, context, comment, target]: [String; FIELD_COUNT] =
                fields.try_into().map_err(|fields: Vec<String>| {
                    StoreError::parse(
                        FileFormat::Catkeys,
                        number + 1,
                        format!("row has {} fields, expected {}", fields.len(), FIELD_COUNT),
                    )
                })?;
            self.core.push(CatkeysUnit {
                source,
                context,
                comment,
                target,
                ..Default::default()
            });
        }
        Ok(self.core.check_duplicates(FileFormat::Catkeys))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let language = self
            .core
            .metadata
            .target_language
            .clone()
            .unwrap_or_else(|| self.header.language.clone());
        let mut out = format!(
            "{}\t{}\t{}\t{}\n",
            self.header.version, language, self.header.signature, self.header.checksum
        );
        for unit in &self.core.units {
            out.push_str(&unit.row());
            out.push('\n');
        }
        Ok(out)
    }
}
