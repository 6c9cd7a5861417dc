/// Wordfast translation memory codec
///
/// Tab delimited: a header row (`%date`, users, `%TU=` count, languages,
/// version, license, attribute lists) followed by one row per translation
/// unit. Files are UTF-16 or Latin-1; characters Latin-1 cannot hold are
/// written as `&'XX;` escapes.
use crate::config::ParseOptions;
use crate::encoding::{self, Encoding, Newline};
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{TranslationUnit, UnitErrors};
use chrono::{Local, NaiveDateTime};

/// Timestamp layout used in the date columns.
pub const TIME_FORMAT: &str = "%Y%m%d~%H%M%S";

const HEADER_FIELDS: usize = 12;
const UNIT_FIELDS: usize = 11;

/// Escape codes and their characters. `&'26;` must come first so that
/// escaping never touches the ampersand of another escape.
const ESCAPES: [(&str, char); 30] = [
    ("&'26;", '\u{0026}'),
    ("&'82;", '\u{201A}'),
    ("&'85;", '\u{2026}'),
    ("&'91;", '\u{2018}'),
    ("&'92;", '\u{2019}'),
    ("&'93;", '\u{201C}'),
    ("&'94;", '\u{201D}'),
    ("&'96;", '\u{2013}'),
    ("&'97;", '\u{2014}'),
    ("&'99;", '\u{2122}'),
    ("&'A0;", '\u{00A0}'),
    ("&'A9;", '\u{00A9}'),
    ("&'AE;", '\u{00AE}'),
    ("&'BC;", '\u{00BC}'),
    ("&'BD;", '\u{00BD}'),
    ("&'BE;", '\u{00BE}'),
    ("&'A8;", '\u{00AE}'),
    ("&'AA;", '\u{2122}'),
    ("&'C7;", '\u{00AB}'),
    ("&'C8;", '\u{00BB}'),
    ("&'C9;", '\u{2026}'),
    ("&'CA;", '\u{00A0}'),
    ("&'D0;", '\u{2013}'),
    ("&'D1;", '\u{2014}'),
    ("&'D2;", '\u{201C}'),
    ("&'D3;", '\u{201D}'),
    ("&'D4;", '\u{2018}'),
    ("&'D5;", '\u{2019}'),
    ("&'E2;", '\u{201A}'),
    ("&'E3;", '\u{201E}'),
];

/// Characters to `&'XX;` escapes, plus `\n` and `\t`.
pub fn escape(text: &str) -> String {
    let mut out = text.to_string();
    for (code, c) in ESCAPES {
        if out.contains(c) {
            out = out.replace(c, code);
        }
    }
    out.replace('\n', "\\n").replace('\t', "\\t")
}

/// Inverse of [`escape`]; `&'26;` is resolved last.
pub fn unescape(text: &str) -> String {
    let mut out = text.to_string();
    for (code, c) in ESCAPES.into_iter().rev() {
        if out.contains(code) {
            out = out.replace(code, &c.to_string());
        }
    }
    out.replace("\\n", "\n").replace("\\t", "\t")
}

pub fn parse_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim_start_matches('%'), TIME_FORMAT).ok()
}

fn now() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordfastHeader {
    fields: Vec<String>,
}

impl Default for WordfastHeader {
    fn default() -> Self {
        let mut fields = vec![
            format!("%{}", now()),
            "%User ID,TS,TS Translation Store".to_string(),
            "%TU=00000001".to_string(),
            "%EN-US".to_string(),
            "%Wordfast TM v.5.51w9/00".to_string(),
            String::new(),
            "%---00000001".to_string(),
        ];
        fields.resize(HEADER_FIELDS, String::new());
        Self { fields }
    }
}

impl WordfastHeader {
    pub fn date(&self) -> Option<NaiveDateTime> {
        parse_time(&self.fields[0])
    }

    pub fn source_language(&self) -> Option<&str> {
        self.fields[3].strip_prefix('%').filter(|l| !l.is_empty())
    }

    pub fn target_language(&self) -> Option<&str> {
        self.fields[5].strip_prefix('%').filter(|l| !l.is_empty())
    }

    pub fn set_target_language(&mut self, language: &str) {
        self.fields[5] = format!("%{}", language);
    }

    pub fn set_unit_count(&mut self, count: usize) {
        self.fields[2] = format!("%TU={:08}", count);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordfastUnit {
    date: String,
    user: String,
    reuse: String,
    source_language: String,
    source: String,
    target_language: String,
    target: String,
    attributes: Vec<String>,
    obsolete: bool,
    errors: UnitErrors,
}

impl WordfastUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            date: now(),
            reuse: "0".to_string(),
            source: source.into(),
            ..Default::default()
        }
    }

    fn from_row(row: &str) -> Self {
        let mut fields: Vec<String> = row.split('\t').map(str::to_string).collect();
        fields.resize(UNIT_FIELDS, String::new());
        let attributes = fields.split_off(7);
        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        Self {
            date: next(),
            user: next(),
            reuse: next(),
            source_language: next(),
            source: unescape(&next()),
            target_language: next(),
            target: unescape(&next()),
            attributes,
            ..Default::default()
        }
    }

    fn row(&self) -> String {
        let mut fields = vec![
            self.date.clone(),
            self.user.clone(),
            self.reuse.clone(),
            self.source_language.clone(),
            escape(&self.source),
            self.target_language.clone(),
            escape(&self.target),
        ];
        fields.extend(self.attributes.iter().cloned());
        while fields.len() > 7 && fields.last().map_or(false, |f| f.is_empty()) {
            fields.pop();
        }
        fields.join("\t")
    }

    pub fn date(&self) -> Option<NaiveDateTime> {
        parse_time(&self.date)
    }
}

impl TranslationUnit for WordfastUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.source.as_str())
    }

    fn set_source(&mut self, source: Multistring) {
        if source != self.source.as_str() {
            self.source = source.as_str().to_string();
            self.date = now();
        }
    }

    fn target(&self) -> Option<Multistring> {
        (!self.target.is_empty()).then(|| Multistring::from(self.target.as_str()))
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        let target = target.map(|t| t.as_str().to_string()).unwrap_or_default();
        if target != self.target {
            self.target = target;
            self.date = now();
        }
    }

    fn is_translated(&self) -> bool {
        !self.source.is_empty() && !self.target.is_empty() && !self.obsolete
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

#[derive(Debug)]
pub struct WordfastStore {
    core: StoreCore<WordfastUnit>,
    pub header: WordfastHeader,
}

impl Default for WordfastStore {
    fn default() -> Self {
        let mut core = StoreCore::new();
        core.metadata.encoding = Encoding::Utf16Le;
        Self {
            core,
            header: WordfastHeader::default(),
        }
    }
}

impl WordfastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[WordfastUnit] {
        &self.core.units
    }
}

/// UTF-16 without a byte-order mark shows up as a tab next to a NUL byte.
fn sniff_encoding(raw: &[u8]) -> Encoding {
    let detected = Encoding::detect(raw);
    if detected.has_bom() {
        return detected;
    }
    let first_line = raw.split(|&b| b == b'\n').next().unwrap_or(raw);
    match first_line.iter().position(|&b| b == 0x09) {
        Some(tab) if tab % 2 == 0 && first_line.get(tab + 1) == Some(&0x00) => Encoding::Utf16Le,
        Some(tab) if tab % 2 == 1 && first_line[tab - 1] == 0x00 => Encoding::Utf16Be,
        _ => Encoding::Latin1,
    }
}

impl TranslationStore for WordfastStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Wordfast
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let mut unit = WordfastUnit::new(source.as_str());
        unit.source_language = self.header.fields[3].clone();
        unit.target_language = self.header.fields[5].clone();
        self.core.push(unit)
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);

        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut lines = raw.lines().filter(|line| !line.is_empty());
        self.header = match lines.next() {
            Some(line) => {
                if !line.starts_with('%') {
                    return Err(StoreError::parse(
                        FileFormat::Wordfast,
                        1,
                        "header row must start with a %date field",
                    ));
                }
                let mut fields: Vec<String> = line.split('\t').map(str::to_string).collect();
                fields.resize(HEADER_FIELDS, String::new());
                WordfastHeader { fields }
            }
            None => WordfastHeader::default(),
        };

        let metadata = &mut self.core.metadata;
        if metadata.source_language.is_none() {
            metadata.source_language = self.header.source_language().map(str::to_string);
        }
        if metadata.target_language.is_none() {
            metadata.target_language = self.header.target_language().map(str::to_string);
        }

        for line in lines {
            self.core.push(WordfastUnit::from_row(line));
        }
        Ok(self.core.check_duplicates(FileFormat::Wordfast))
    }

    fn parse_bytes(&mut self, raw: &[u8], options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let encoding = sniff_encoding(raw);
        let text = encoding::decode_as(raw, encoding)?;
        let report = self.parse(&text, options)?;
        self.core.metadata.encoding = encoding;
        self.core.metadata.newline = Newline::detect(raw);
        Ok(report)
    }

    /// Only translated units are written; a memory without any is empty.
    fn serialize(&self) -> Result<String, StoreError> {
        let rows: Vec<String> = self
            .core
            .units
            .iter()
            .filter(|unit| unit.is_translated())
            .map(WordfastUnit::row)
            .collect();
        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut header = self.header.clone();
        header.set_unit_count(rows.len());
        if let Some(language) = &self.core.metadata.target_language {
            header.set_target_language(language);
        }
        let mut out = header.fields.join("\t");
        out.push('\n');
        for row in rows {
            out.push_str(&row);
            out.push('\n');
        }
        Ok(out)
    }

    /// Latin-1 content that gained wider characters falls back to UTF-16.
    fn serialize_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let text = self.core.metadata.newline.apply(&self.serialize()?);
        match encoding::encode(&text, self.core.metadata.encoding) {
            Err(StoreError::Encoding(_)) => encoding::encode(&text, Encoding::Utf16Le),
            result => result,
        }
    }
}
