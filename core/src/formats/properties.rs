/// Java/Mozilla `.properties` and OS X `.strings` codec
///
/// Java escapes non-ASCII as `\uXXXX`; Mozilla writes UTF-8 as-is. Both
/// continue values across lines with a trailing backslash. OS X strings use
/// `"key" = "value";` statements with C comments.
use super::monolingual::Value;
use crate::config::ParseOptions;
use crate::error::{line_of, StoreError};
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Java,
    Mozilla,
    Strings,
}

/// Escape a property value. Leading and trailing spaces become `\ `.
pub fn escape_value(value: &str, ascii_only: bool) -> String {
    let chars: Vec<char> = value.chars().collect();
    let leading = chars.iter().take_while(|c| **c == ' ').count();
    let trailing_start = chars.len()
        - chars[leading..].iter().rev().take_while(|c| **c == ' ').count();

    let mut out = String::with_capacity(value.len());
    for (index, &c) in chars.iter().enumerate() {
        match c {
            ' ' if index < leading || index >= trailing_start => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if ascii_only && !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}

fn escape_key(key: &str, ascii_only: bool) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '=' | ':' | '#' | '!' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push_str(&escape_value(c.encode_utf8(&mut [0; 4]), ascii_only)),
        }
    }
    out
}

/// Decode backslash escapes, combining UTF-16 surrogate pairs.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_high: Option<u16> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_surrogate(&mut out, &mut pending_high);
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u16::from_str_radix(&hex, 16) {
                    Ok(unit) if hex.len() == 4 => {
                        for _ in 0..4 {
                            chars.next();
                        }
                        push_utf16_unit(&mut out, &mut pending_high, unit);
                    }
                    _ => {
                        flush_surrogate(&mut out, &mut pending_high);
                        out.push('u');
                    }
                }
            }
            Some(other) => {
                flush_surrogate(&mut out, &mut pending_high);
                out.push(match other {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'f' => '\u{c}',
                    c => c,
                });
            }
            None => flush_surrogate(&mut out, &mut pending_high),
        }
    }
    flush_surrogate(&mut out, &mut pending_high);
    out
}

fn push_utf16_unit(out: &mut String, pending_high: &mut Option<u16>, unit: u16) {
    if let Some(high) = pending_high.take() {
        if (0xDC00..0xE000).contains(&unit) {
            let decoded = char::decode_utf16([high, unit])
                .next()
                .and_then(Result::ok)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            out.push(decoded);
            return;
        }
        out.push(char::REPLACEMENT_CHARACTER);
    }
    if (0xD800..0xDC00).contains(&unit) {
        *pending_high = Some(unit);
    } else {
        out.push(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
}

fn flush_surrogate(out: &mut String, pending_high: &mut Option<u16>) {
    if pending_high.take().is_some() {
        out.push(char::REPLACEMENT_CHARACTER);
    }
}

/// Escape for an OS X strings literal.
pub fn escape_strings(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertiesUnit {
    key: String,
    value: Value,
    delimiter: String,
    /// Raw comment and blank lines preceding the entry.
    comments: Vec<String>,
    errors: UnitErrors,
}

impl PropertiesUnit {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            delimiter: "=".to_string(),
            comments: Vec::new(),
            errors: UnitErrors::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn write(&self, dialect: Dialect, out: &mut String) {
        for line in &self.comments {
            out.push_str(line);
            out.push('\n');
        }
        if self.key.is_empty() {
            return;
        }
        match dialect {
            Dialect::Strings => out.push_str(&format!(
                "\"{}\"{}\"{}\";\n",
                escape_strings(&self.key),
                self.delimiter,
                escape_strings(&self.value.text)
            )),
            Dialect::Java | Dialect::Mozilla => {
                let ascii_only = dialect == Dialect::Java;
                out.push_str(&escape_key(&self.key, ascii_only));
                out.push_str(&self.delimiter);
                out.push_str(&escape_value(&self.value.text, ascii_only));
                out.push('\n');
            }
        }
    }
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let text = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix('!'))
        .or_else(|| trimmed.strip_prefix("//"))
        .or_else(|| {
            trimmed
                .strip_prefix("/*")
                .map(|t| t.strip_suffix("*/").unwrap_or(t))
        })?;
    Some(text.trim())
}

impl TranslationUnit for PropertiesUnit {
    monolingual_unit_methods!();

    fn id(&self) -> String {
        self.key.clone()
    }

    fn set_id(&mut self, id: &str) {
        self.key = id.to_string();
    }

    fn locations(&self) -> Vec<String> {
        if self.key.is_empty() {
            Vec::new()
        } else {
            vec![self.key.clone()]
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => {
                join_notes(self.comments.iter().filter_map(|line| comment_text(line)))
            }
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        for line in text.lines() {
            self.comments.push(format!("# {}", line));
        }
    }

    fn remove_notes(&mut self) {
        self.comments.retain(|line| comment_text(line).is_none());
    }
}

#[derive(Debug)]
pub struct PropertiesStore {
    core: StoreCore<PropertiesUnit>,
    dialect: Dialect,
    template: bool,
}

impl PropertiesStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            core: StoreCore::new(),
            dialect,
            template: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn units(&self) -> &[PropertiesUnit] {
        &self.core.units
    }
}

impl TranslationStore for PropertiesStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        match self.dialect {
            Dialect::Strings => FileFormat::Strings,
            Dialect::Java | Dialect::Mozilla => FileFormat::Properties,
        }
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let mut unit = PropertiesUnit::new(source.as_str(), Value::new(source.as_str(), self.template));
        if self.dialect == Dialect::Strings {
            unit.delimiter = " = ".to_string();
        }
        self.core.push(unit)
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.template = options.template;
        let units = match self.dialect {
            Dialect::Strings => parse_strings(raw, options.template)?,
            Dialect::Java | Dialect::Mozilla => parse_properties(raw, options.template),
        };
        for unit in units {
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(self.format()))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for unit in &self.core.units {
            unit.write(self.dialect, &mut out);
        }
        Ok(out)
    }
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn parse_properties(raw: &str, template: bool) -> Vec<PropertiesUnit> {
    let mut units = Vec::new();
    let mut comments = Vec::new();
    let mut lines = raw.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            comments.push(line.trim_end().to_string());
            continue;
        }

        // Join continuation lines
        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, delimiter, value) = split_entry(&logical);
        let mut unit = PropertiesUnit::new(unescape(key), Value::new(unescape(value), template));
        unit.delimiter = delimiter.to_string();
        unit.comments = std::mem::take(&mut comments);
        units.push(unit);
    }

    if !comments.is_empty() {
        let mut unit = PropertiesUnit::new("", Value::new("", template));
        unit.comments = comments;
        units.push(unit);
    }
    units
}

/// Splits `key = value` at the first unescaped `=`, `:` or whitespace.
fn split_entry(line: &str) -> (&str, &str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = index;
                break;
            }
            c if c.is_whitespace() => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let rest = &line[key_end..];
    let after_space = rest.trim_start();
    let mut delimiter_len = rest.len() - after_space.len();
    if after_space.starts_with('=') || after_space.starts_with(':') {
        delimiter_len += 1;
        let after_sep = &rest[delimiter_len..];
        delimiter_len += after_sep.len() - after_sep.trim_start().len();
    }
    (
        &line[..key_end],
        &rest[..delimiter_len],
        &rest[delimiter_len..],
    )
}

fn parse_strings(raw: &str, template: bool) -> Result<Vec<PropertiesUnit>, StoreError> {
    let error = |offset: usize, message: &str| {
        StoreError::parse(FileFormat::Strings, line_of(raw, offset), message)
    };

    let mut units = Vec::new();
    let mut comments = Vec::new();
    let mut pos = 0;

    while let Some(c) = raw[pos..].chars().next() {
        let rest = &raw[pos..];
        if c == '\n' {
            // A blank line is kept with the comments above the next entry
            if raw[..pos].ends_with('\n') || pos == 0 {
                comments.push(String::new());
            }
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if rest.starts_with("/*") {
            let end = rest
                .find("*/")
                .ok_or_else(|| error(pos, "unterminated comment"))?;
            comments.push(rest[..end + 2].to_string());
            pos += end + 2;
            continue;
        }
        if rest.starts_with("//") {
            let end = rest.find('\n').unwrap_or(rest.len());
            comments.push(rest[..end].trim_end().to_string());
            pos += end;
            continue;
        }
        if c != '"' {
            return Err(error(pos, "expected a quoted key"));
        }

        let (key, key_len) = read_literal(rest).ok_or_else(|| error(pos, "unterminated key"))?;
        let after_key = &rest[key_len..];
        let eq = after_key
            .find('=')
            .filter(|i| after_key[..*i].trim().is_empty())
            .ok_or_else(|| error(pos, "expected '='"))?;
        let after_eq = &after_key[eq + 1..];
        let value_start = after_eq.len() - after_eq.trim_start().len();
        let delimiter = &after_key[..eq + 1 + value_start];
        let (value, value_len) = read_literal(&after_eq[value_start..])
            .ok_or_else(|| error(pos, "unterminated value"))?;
        let after_value = &after_eq[value_start + value_len..];
        let semi = after_value
            .find(';')
            .filter(|i| after_value[..*i].trim().is_empty())
            .ok_or_else(|| error(pos, "expected ';'"))?;

        let mut unit = PropertiesUnit::new(key, Value::new(value, template));
        unit.delimiter = delimiter.to_string();
        unit.comments = std::mem::take(&mut comments);
        units.push(unit);
        pos += key_len + eq + 1 + value_start + value_len + semi + 1;
    }

    if comments.iter().any(|c| !c.is_empty()) {
        let mut unit = PropertiesUnit::new("", Value::new("", template));
        unit.comments = comments;
        units.push(unit);
    }
    Ok(units)
}

/// Reads a `"..."` literal at the start of `text`; returns the decoded value
/// and the number of bytes consumed.
fn read_literal(text: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = text.char_indices();
    chars.next().filter(|(_, c)| *c == '"')?;
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Some((out, index + 1)),
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'U' | 'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                        let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)?;
                        out.push(decoded);
                    }
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(dialect: Dialect, raw: &str) -> PropertiesStore {
        let mut store = PropertiesStore::new(dialect);
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    #[test]
    fn escapes_control_characters_and_edge_spaces() {
        assert_eq!(escape_value("  a b ", true), "\\ \\ a b\\ ");
        assert_eq!(escape_value("tab\there\nnew", true), "tab\\there\\nnew");
        assert_eq!(escape_value("C:\\dir", true), "C:\\\\dir");
    }

    #[test]
    fn java_escapes_non_ascii() {
        assert_eq!(escape_value("é", true), "\\u00E9");
        assert_eq!(escape_value("é", false), "é");
        assert_eq!(escape_value("😀", true), "\\uD83D\\uDE00");
        assert_eq!(unescape("\\uD83D\\uDE00"), "😀");
    }

    #[test]
    fn parses_keys_delimiters_and_continuations() {
        let store = parse(
            Dialect::Java,
            "# Greeting\nhello = Hello \\\n    World\nother:value\nspaced  value here\ncaf\\u00E9=Caf\\u00E9\n",
        );
        let units = store.units();
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].key(), "hello");
        assert_eq!(units[0].source(), "Hello World");
        assert_eq!(units[0].notes(None), "Greeting");
        assert_eq!(units[1].source(), "value");
        assert_eq!(units[2].key(), "spaced");
        assert_eq!(units[2].source(), "value here");
        assert_eq!(units[3].key(), "café");
        assert_eq!(units[3].source(), "Café");
    }

    #[test]
    fn java_roundtrip_is_idempotent() {
        let raw = "# c\n\nkey\\ with\\ space = \\ lead\\u00E9\nx=y\n# tail\n";
        let first = parse(Dialect::Java, raw).serialize().unwrap();
        assert_eq!(first, raw);
        let second = parse(Dialect::Java, &first).serialize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parses_osx_strings() {
        let raw = "/* Title of the window */\n\"window.title\" = \"Settings \\\"beta\\\"\";\n\n// tail\n";
        let store = parse(Dialect::Strings, raw);
        assert_eq!(store.unit_count(), 2);
        let unit = &store.units()[0];
        assert_eq!(unit.id(), "window.title");
        assert_eq!(unit.source(), "Settings \"beta\"");
        assert_eq!(unit.notes(None), "Title of the window");
        let text = store.serialize().unwrap();
        assert!(text.contains("\"window.title\" = \"Settings \\\"beta\\\"\";\n"));
        assert_eq!(parse(Dialect::Strings, &text).serialize().unwrap(), text);
    }

    #[test]
    fn strings_syntax_errors_name_the_line() {
        let mut store = PropertiesStore::new(Dialect::Strings);
        let err = store
            .parse("\"a\" = \"b\";\n\"c\" \"d\";\n", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse { line: 2, .. }));
    }
}
