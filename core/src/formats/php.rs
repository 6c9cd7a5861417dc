/// PHP localisation codec
///
/// Reads `$var['key'] = 'value';` assignments and `'key' => 'value',` entries
/// of `$var = array(...)` / `[...]` blocks. Only the backslash and the quote
/// character of the literal are escaped.
use super::monolingual::Value;
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};
use once_cell::sync::Lazy;
use regex::Regex;

static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)(\$[^=]+?|'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")(\s*=>?\s*)(['"])"#)
        .expect("valid php entry regex")
});

static ARRAY_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\$\w+)\s*=\s*(?:array\s*\(|\[)\s*$").expect("valid php array regex")
});

static ARRAY_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\)\]]\s*;").expect("valid php array end regex"));

pub fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape`]; other backslash sequences are left as written.
pub fn unescape(literal: &str, quote: char) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == quote {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Prefix {
    Comment(String),
    Code(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhpUnit {
    name: String,
    array: Option<String>,
    value: Value,
    indent: String,
    separator: String,
    quote: char,
    terminator: String,
    prefix: Vec<Prefix>,
    errors: UnitErrors,
}

impl PhpUnit {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            array: None,
            value,
            indent: String::new(),
            separator: " = ".to_string(),
            quote: '\'',
            terminator: ";".to_string(),
            prefix: Vec::new(),
            errors: UnitErrors::new(),
        }
    }

    /// The left-hand side as written, e.g. `$lang['title']` or `'title'`.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, out: &mut String) {
        for line in &self.prefix {
            match line {
                Prefix::Comment(text) | Prefix::Code(text) => out.push_str(text),
            }
            out.push('\n');
        }
        if self.name.is_empty() {
            return;
        }
        out.push_str(&format!(
            "{}{}{}{q}{}{q}{}\n",
            self.indent,
            self.name,
            self.separator,
            escape(&self.value.text, self.quote),
            self.terminator,
            q = self.quote
        ));
    }
}

fn comment_text(line: &str) -> &str {
    let trimmed = line.trim();
    let text = trimmed
        .strip_prefix("//")
        .or_else(|| trimmed.strip_prefix('#'))
        .or_else(|| trimmed.strip_prefix("/**"))
        .or_else(|| trimmed.strip_prefix("/*"))
        .or_else(|| trimmed.strip_prefix('*').filter(|t| !t.starts_with('/')))
        .unwrap_or(trimmed);
    text.strip_suffix("*/").unwrap_or(text).trim()
}

impl TranslationUnit for PhpUnit {
    monolingual_unit_methods!();

    fn id(&self) -> String {
        let key = self.name.trim();
        match &self.array {
            Some(array) => format!("{}->{}", array, key.trim_matches(|c| c == '\'' || c == '"')),
            None => key.to_string(),
        }
    }

    fn set_id(&mut self, id: &str) {
        match id.split_once("->") {
            Some((array, key)) => {
                self.array = Some(array.to_string());
                self.name = format!("'{}'", key);
                self.separator = " => ".to_string();
                self.terminator = ",".to_string();
            }
            None => self.name = id.to_string(),
        }
    }

    fn locations(&self) -> Vec<String> {
        if self.name.is_empty() {
            Vec::new()
        } else {
            vec![self.id()]
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => join_notes(
                self.prefix
                    .iter()
                    .filter_map(|line| match line {
                        Prefix::Comment(text) => Some(comment_text(text)),
                        Prefix::Code(_) => None,
                    })
                    .filter(|text| !text.is_empty()),
            ),
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        for line in text.lines() {
            self.prefix
                .push(Prefix::Comment(format!("{}// {}", self.indent, line)));
        }
    }

    fn remove_notes(&mut self) {
        self.prefix.retain(|line| matches!(line, Prefix::Code(_)));
    }
}

#[derive(Debug, Default)]
pub struct PhpStore {
    core: StoreCore<PhpUnit>,
    template: bool,
}

impl PhpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[PhpUnit] {
        &self.core.units
    }
}

impl TranslationStore for PhpStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Php
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let name = format!("$string{}", self.core.units.len() + 1);
        self.core
            .push(PhpUnit::new(name, Value::new(source.as_str(), self.template)))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.template = options.template;
        for unit in parse_units(raw, options.template)? {
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(FileFormat::Php))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for unit in &self.core.units {
            unit.write(&mut out);
        }
        Ok(out)
    }
}

/// Byte offset of the unescaped closing `quote` in `text`.
fn string_end(text: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(index);
        }
    }
    None
}

fn parse_units(raw: &str, template: bool) -> Result<Vec<PhpUnit>, StoreError> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut units = Vec::new();
    let mut prefix = Vec::new();
    let mut array: Option<String> = None;
    let mut in_block_comment = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        i += 1;

        if in_block_comment {
            in_block_comment = !trimmed.contains("*/");
            prefix.push(Prefix::Comment(line.to_string()));
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block_comment = !trimmed[2..].contains("*/");
            prefix.push(Prefix::Comment(line.to_string()));
            continue;
        }
        if trimmed.starts_with("//") || (trimmed.starts_with('#') && !trimmed.starts_with("#[")) {
            prefix.push(Prefix::Comment(line.to_string()));
            continue;
        }

        let Some(caps) = ENTRY_RE.captures(line) else {
            if let Some(start) = ARRAY_START_RE.captures(line) {
                array = Some(start[1].to_string());
            } else if ARRAY_END_RE.is_match(line) {
                array = None;
            }
            prefix.push(Prefix::Code(line.to_string()));
            continue;
        };

        let quote = caps[4].chars().next().unwrap_or('\'');
        let start_line = i;
        let mut body = line[caps[0].len()..].to_string();
        let end = loop {
            if let Some(end) = string_end(&body, quote) {
                break end;
            }
            match lines.get(i) {
                Some(next) => {
                    body.push('\n');
                    body.push_str(next);
                    i += 1;
                }
                None => {
                    return Err(StoreError::parse(
                        FileFormat::Php,
                        start_line,
                        "unterminated string literal",
                    ))
                }
            }
        };

        let name = caps[2].to_string();
        let mut unit = PhpUnit::new(name, Value::new(unescape(&body[..end], quote), template));
        unit.indent = caps[1].to_string();
        unit.separator = caps[3].to_string();
        unit.quote = quote;
        unit.terminator = body[end + quote.len_utf8()..].trim_end().to_string();
        // Array entries are keyed by their quoted key, assignments by variable
        if unit.name.starts_with('$') {
            unit.array = None;
        } else {
            unit.array = array.clone();
        }
        unit.prefix = std::mem::take(&mut prefix);
        units.push(unit);
    }

    if !prefix.is_empty() {
        let mut unit = PhpUnit::new("", Value::new("", template));
        unit.prefix = prefix;
        units.push(unit);
    }
    Ok(units)
}
