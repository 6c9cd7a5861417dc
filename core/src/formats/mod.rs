/// Per-format codecs behind the [`TranslationStore`] contract.
///
/// The concrete store type is chosen here, before any instance exists:
/// sniffing (PO-flavoured XLIFF, UTF-8 properties) happens on the raw content.
#[macro_use]
mod monolingual;

pub mod catkeys;
pub mod csv;
pub mod dtd;
pub mod html;
pub mod ini;
pub mod lang;
pub mod lisa;
pub mod odf;
pub mod php;
pub mod po;
pub mod poxliff;
pub mod properties;
pub mod qph;
pub mod subtitles;
pub mod ts;
pub mod wordfast;
pub mod xliff;
pub mod xml;

use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::store::{ParseReport, TranslationStore};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Po,
    Pot,
    Xliff,
    PoXliff,
    Ts,
    Qph,
    Tmx,
    Tbx,
    Dtd,
    Properties,
    Strings,
    Php,
    Catkeys,
    Csv,
    Lang,
    Ini,
    Srt,
    Sub,
    Ssa,
    Wordfast,
    Html,
    Odf,
    Unknown,
}

impl FileFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "po" => Self::Po,
            "pot" => Self::Pot,
            "xlf" | "xliff" => Self::Xliff,
            "ts" => Self::Ts,
            "qph" => Self::Qph,
            "tmx" => Self::Tmx,
            "tbx" => Self::Tbx,
            "dtd" => Self::Dtd,
            "properties" => Self::Properties,
            "strings" => Self::Strings,
            "php" => Self::Php,
            "catkeys" => Self::Catkeys,
            "csv" => Self::Csv,
            "lang" => Self::Lang,
            "ini" => Self::Ini,
            "srt" => Self::Srt,
            "sub" => Self::Sub,
            "ssa" | "ass" => Self::Ssa,
            "txt" => Self::Wordfast,
            "html" | "htm" | "xhtml" => Self::Html,
            "odt" | "ods" | "odp" => Self::Odf,
            _ => Self::Unknown,
        }
    }

    /// Detect format from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// File extensions bound to this format, preferred one first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Po => &["po"],
            Self::Pot => &["pot"],
            Self::Xliff | Self::PoXliff => &["xlf", "xliff"],
            Self::Ts => &["ts"],
            Self::Qph => &["qph"],
            Self::Tmx => &["tmx"],
            Self::Tbx => &["tbx"],
            Self::Dtd => &["dtd"],
            Self::Properties => &["properties"],
            Self::Strings => &["strings"],
            Self::Php => &["php"],
            Self::Catkeys => &["catkeys"],
            Self::Csv => &["csv"],
            Self::Lang => &["lang"],
            Self::Ini => &["ini"],
            Self::Srt => &["srt"],
            Self::Sub => &["sub"],
            Self::Ssa => &["ssa", "ass"],
            Self::Wordfast => &["txt"],
            Self::Html => &["html", "htm", "xhtml"],
            Self::Odf => &["odt", "ods", "odp"],
            Self::Unknown => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Po => "po",
            Self::Pot => "pot",
            Self::Xliff => "xliff",
            Self::PoXliff => "poxliff",
            Self::Ts => "ts",
            Self::Qph => "qph",
            Self::Tmx => "tmx",
            Self::Tbx => "tbx",
            Self::Dtd => "dtd",
            Self::Properties => "properties",
            Self::Strings => "strings",
            Self::Php => "php",
            Self::Catkeys => "catkeys",
            Self::Csv => "csv",
            Self::Lang => "lang",
            Self::Ini => "ini",
            Self::Srt => "srt",
            Self::Sub => "sub",
            Self::Ssa => "ssa",
            Self::Wordfast => "wordfast",
            Self::Html => "html",
            Self::Odf => "odf",
            Self::Unknown => "unknown",
        }
    }

    /// One-way codecs that extract units but cannot write documents back.
    pub fn is_extraction_only(self) -> bool {
        matches!(self, Self::Html | Self::Odf)
    }

    /// Value-only formats where the document holds a single string per unit.
    pub fn is_monolingual(self) -> bool {
        matches!(
            self,
            Self::Dtd
                | Self::Properties
                | Self::Strings
                | Self::Php
                | Self::Ini
                | Self::Srt
                | Self::Sub
                | Self::Ssa
        )
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build an empty store of the given format.
pub fn new_store(format: FileFormat) -> Result<Box<dyn TranslationStore>, StoreError> {
    let store: Box<dyn TranslationStore> = match format {
        FileFormat::Po => Box::new(po::PoStore::new()),
        FileFormat::Pot => Box::new(po::PoStore::template()),
        FileFormat::Xliff => Box::new(xliff::XliffStore::new()),
        FileFormat::PoXliff => Box::new(poxliff::PoXliffStore::new()),
        FileFormat::Ts => Box::new(ts::TsStore::new()),
        FileFormat::Qph => Box::new(qph::QphStore::new()),
        FileFormat::Tmx => Box::new(lisa::LisaStore::tmx()),
        FileFormat::Tbx => Box::new(lisa::LisaStore::tbx()),
        FileFormat::Dtd => Box::new(dtd::DtdStore::new()),
        FileFormat::Properties => Box::new(properties::PropertiesStore::new(
            properties::Dialect::Java,
        )),
        FileFormat::Strings => Box::new(properties::PropertiesStore::new(
            properties::Dialect::Strings,
        )),
        FileFormat::Php => Box::new(php::PhpStore::new()),
        FileFormat::Catkeys => Box::new(catkeys::CatkeysStore::new()),
        FileFormat::Csv => Box::new(csv::CsvStore::new()),
        FileFormat::Lang => Box::new(lang::LangStore::new()),
        FileFormat::Ini => Box::new(ini::IniStore::new()),
        FileFormat::Srt => Box::new(subtitles::SubtitleStore::new(subtitles::Dialect::SubRip)),
        FileFormat::Sub => Box::new(subtitles::SubtitleStore::new(subtitles::Dialect::MicroDvd)),
        FileFormat::Ssa => Box::new(subtitles::SubtitleStore::new(subtitles::Dialect::SubStation)),
        FileFormat::Wordfast => Box::new(wordfast::WordfastStore::new()),
        FileFormat::Html => Box::new(html::HtmlStore::new()),
        FileFormat::Odf => Box::new(odf::OdfStore::new()),
        FileFormat::Unknown => return Err(StoreError::unsupported(format, "open a store")),
    };
    Ok(store)
}

/// Line breaks folded into spaces, for line-oriented formats with no escape for them.
pub(crate) fn single_line<'a>(format: FileFormat, text: &'a str) -> Cow<'a, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    log::warn!("{}: line break in {:?} written as a space", format, text);
    Cow::Owned(text.replace("\r\n", " ").replace(['\n', '\r'], " "))
}

/// Refine a declared format from the content it labels.
pub fn sniff_format(declared: FileFormat, raw: &str) -> FileFormat {
    match declared {
        FileFormat::Xliff if poxliff::looks_like_poxliff(raw) => FileFormat::PoXliff,
        other => other,
    }
}

/// Build and parse a store in one step.
pub fn parse_store(
    format: FileFormat,
    raw: &str,
    options: &ParseOptions,
) -> Result<(Box<dyn TranslationStore>, ParseReport), StoreError> {
    let format = sniff_format(format, raw);
    let mut store = match format {
        FileFormat::Properties if !raw.is_ascii() => Box::new(properties::PropertiesStore::new(
            properties::Dialect::Mozilla,
        )) as Box<dyn TranslationStore>,
        other => new_store(other)?,
    };
    let report = store.parse(raw, options)?;
    Ok((store, report))
}

/// Build and parse a store from raw bytes, detecting the text encoding.
pub fn parse_store_bytes(
    format: FileFormat,
    raw: &[u8],
    options: &ParseOptions,
) -> Result<(Box<dyn TranslationStore>, ParseReport), StoreError> {
    // ODF packages are zip archives, not text
    if format == FileFormat::Odf {
        let mut store = odf::OdfStore::new();
        let report = store.parse_bytes(raw, options)?;
        return Ok((Box::new(store), report));
    }

    let (text, _) = crate::encoding::decode(raw)?;
    let format = sniff_format(format, &text);
    let mut store = match format {
        FileFormat::Properties if !text.is_ascii() => Box::new(properties::PropertiesStore::new(
            properties::Dialect::Mozilla,
        )) as Box<dyn TranslationStore>,
        other => new_store(other)?,
    };
    let report = store.parse_bytes(raw, options)?;
    Ok((store, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_from_extensions() {
        assert_eq!(FileFormat::from_extension("PO"), FileFormat::Po);
        assert_eq!(FileFormat::from_extension("xlf"), FileFormat::Xliff);
        assert_eq!(FileFormat::from_extension("ass"), FileFormat::Ssa);
        assert_eq!(FileFormat::from_extension("odt"), FileFormat::Odf);
        assert_eq!(FileFormat::from_extension("exe"), FileFormat::Unknown);
        assert_eq!(
            FileFormat::from_path(Path::new("locale/af/browser.dtd")),
            FileFormat::Dtd
        );
        assert_eq!(FileFormat::from_path(Path::new("README")), FileFormat::Unknown);
    }

    #[test]
    fn extensions_map_back_to_their_format() {
        for format in [FileFormat::Po, FileFormat::Ts, FileFormat::Ssa, FileFormat::Html, FileFormat::Odf] {
            for ext in format.extensions() {
                assert_eq!(FileFormat::from_extension(ext), format, "{}", ext);
            }
        }
        assert_eq!(FileFormat::PoXliff.extensions()[0], "xlf");
        assert!(FileFormat::Unknown.extensions().is_empty());
    }

    #[test]
    fn unknown_format_has_no_store() {
        assert!(matches!(
            new_store(FileFormat::Unknown),
            Err(StoreError::UnsupportedCapability { .. })
        ));
    }

    #[test]
    fn every_known_format_builds_a_store() {
        for format in [
            FileFormat::Po,
            FileFormat::Pot,
            FileFormat::Xliff,
            FileFormat::PoXliff,
            FileFormat::Ts,
            FileFormat::Qph,
            FileFormat::Tmx,
            FileFormat::Tbx,
            FileFormat::Dtd,
            FileFormat::Properties,
            FileFormat::Strings,
            FileFormat::Php,
            FileFormat::Catkeys,
            FileFormat::Csv,
            FileFormat::Lang,
            FileFormat::Ini,
            FileFormat::Srt,
            FileFormat::Sub,
            FileFormat::Ssa,
            FileFormat::Wordfast,
            FileFormat::Html,
            FileFormat::Odf,
        ] {
            let store = new_store(format).unwrap();
            assert_eq!(store.unit_count(), 0, "{}", format);
            assert!(store.is_empty());
        }
    }

    #[test]
    fn po_flavoured_xliff_is_sniffed_before_construction() {
        let raw = r#"<?xml version="1.0"?>
<xliff version="1.1" xmlns="urn:oasis:names:tc:xliff:document:1.1">
<file original="x.po" source-language="en" datatype="po"><body/></file></xliff>"#;
        assert_eq!(sniff_format(FileFormat::Xliff, raw), FileFormat::PoXliff);
        let (store, _) = parse_store(FileFormat::Xliff, raw, &ParseOptions::default()).unwrap();
        assert_eq!(store.format(), FileFormat::PoXliff);
    }

    #[test]
    fn utf8_properties_use_the_mozilla_dialect() {
        let (store, _) =
            parse_store(FileFormat::Properties, "key=café\n", &ParseOptions::default()).unwrap();
        assert_eq!(store.serialize().unwrap(), "key=café\n");
    }
}
