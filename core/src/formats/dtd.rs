/// Mozilla DTD codec: `<!ENTITY name "value">` declarations
///
/// Comments before an entity become its developer notes. Parameter entities and
/// external declarations are carried through verbatim.
use super::monolingual::Value;
use crate::config::ParseOptions;
use crate::error::{line_of, StoreError};
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};
use once_cell::sync::Lazy;
use regex::Regex;

static ENTITY_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#x[0-9a-fA-F]+|[A-Za-z_:][\w.:-]*);").expect("valid entity reference regex")
});

/// Quote a value for a DTD literal.
///
/// Stray ampersands become `&amp;`, entity references stay as written. The
/// double quote is preferred; a value containing one is single-quoted, and
/// when both occur the single quotes are written as `&apos;`.
///
/// Because references pass through untouched, a value that literally holds
/// `&amp;` or `&apos;` does not come back from [`unquote`] as written: those two
/// are resolved to `&` and `'`. Every other value satisfies
/// `unquote(&quote(v)) == v`.
pub fn quote(value: &str) -> String {
    let escaped = escape_ampersands(value);
    if !escaped.contains('"') {
        format!("\"{}\"", escaped)
    } else if !escaped.contains('\'') {
        format!("'{}'", escaped)
    } else {
        format!("'{}'", escaped.replace('\'', "&apos;"))
    }
}

/// Inverse of [`quote`]; `literal` includes its quote characters.
pub fn unquote(literal: &str) -> String {
    let Some(quote_char) = literal.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return literal.to_string();
    };
    let inner = literal[1..].strip_suffix(quote_char).unwrap_or(&literal[1..]);
    let inner = if quote_char == '\'' {
        inner.replace("&apos;", "'")
    } else {
        inner.to_string()
    };
    inner.replace("&amp;", "&")
}

fn escape_ampersands(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (index, c) in value.char_indices() {
        if c == '&' && !ENTITY_REF_RE.is_match(&value[index..]) {
            out.push_str("&amp;");
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DtdUnit {
    name: String,
    value: Value,
    comments: Vec<String>,
    /// Declarations and stray lines written before this unit as-is.
    unparsed: Vec<String>,
    errors: UnitErrors,
}

impl DtdUnit {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, out: &mut String) {
        for line in &self.unparsed {
            out.push_str(line);
            out.push('\n');
        }
        for comment in &self.comments {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->\n");
        }
        if !self.name.is_empty() {
            out.push_str(&format!("<!ENTITY {} {}>\n", self.name, quote(&self.value.text)));
        }
    }
}

impl TranslationUnit for DtdUnit {
    monolingual_unit_methods!();

    fn id(&self) -> String {
        self.name.clone()
    }

    fn set_id(&mut self, id: &str) {
        self.name = id.to_string();
    }

    fn locations(&self) -> Vec<String> {
        if self.name.is_empty() {
            Vec::new()
        } else {
            vec![self.name.clone()]
        }
    }

    fn add_location(&mut self, location: &str) {
        if self.name.is_empty() {
            self.name = location.to_string();
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => {
                join_notes(self.comments.iter().map(|c| c.trim()))
            }
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        // `--` cannot appear inside an XML comment
        self.comments.push(format!(" {} ", text.replace("--", "- -")));
    }

    fn remove_notes(&mut self) {
        self.comments.clear();
    }
}

#[derive(Debug, Default)]
pub struct DtdStore {
    core: StoreCore<DtdUnit>,
    template: bool,
}

impl DtdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[DtdUnit] {
        &self.core.units
    }
}

impl TranslationStore for DtdStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Dtd
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let name = format!("entity{}", self.core.units.len() + 1);
        self.core
            .push(DtdUnit::new(name, Value::new(source.as_str(), self.template)))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.template = options.template;
        for unit in parse_units(raw, options.template)? {
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(FileFormat::Dtd))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for unit in &self.core.units {
            unit.write(&mut out);
        }
        Ok(out)
    }
}

enum Declaration {
    Entity { name: String, literal: String },
    Verbatim(String),
}

fn parse_units(raw: &str, template: bool) -> Result<Vec<DtdUnit>, StoreError> {
    let error = |offset: usize, message: &str| {
        StoreError::parse(FileFormat::Dtd, line_of(raw, offset), message)
    };

    let mut units = Vec::new();
    let mut pending = DtdUnit::default();
    let mut pos = 0;

    while let Some(c) = raw[pos..].chars().next() {
        let rest = &raw[pos..];
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or_else(|| error(pos, "unterminated comment"))?;
            pending.comments.push(body[..end].to_string());
            pos += 4 + end + 3;
            continue;
        }

        if rest.starts_with("<!ENTITY") {
            let (consumed, declaration) = parse_declaration(rest).map_err(|msg| error(pos, msg))?;
            pos += consumed;
            match declaration {
                Declaration::Entity { name, literal } => {
                    let mut unit = std::mem::take(&mut pending);
                    unit.name = name;
                    unit.value = Value::new(unquote(&literal), template);
                    units.push(unit);
                }
                Declaration::Verbatim(text) => pending.unparsed.push(text),
            }
            continue;
        }

        // References such as `%brandDTD;` and anything unrecognised
        let end = rest.find('\n').unwrap_or(rest.len());
        pending.unparsed.push(rest[..end].trim_end().to_string());
        pos += end;
    }

    if !pending.comments.is_empty() || !pending.unparsed.is_empty() {
        pending.value.template = template;
        units.push(pending);
    }
    Ok(units)
}

/// Parses one `<!ENTITY ...>` starting at the beginning of `rest`.
/// Returns the number of bytes consumed.
fn parse_declaration(rest: &str) -> Result<(usize, Declaration), &'static str> {
    let close = declaration_end(rest).ok_or("unterminated entity declaration")?;
    let text = &rest[..=close];
    let body = text["<!ENTITY".len()..text.len() - 1].trim_start();

    if body.starts_with('%') {
        return Ok((close + 1, Declaration::Verbatim(text.to_string())));
    }

    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .ok_or("entity without a value")?;
    let name = &body[..name_end];
    let value = body[name_end..].trim();
    if name.is_empty() {
        return Err("entity without a name");
    }

    match value.chars().next() {
        Some(q @ ('"' | '\'')) if value.len() >= 2 && value.ends_with(q) => Ok((
            close + 1,
            Declaration::Entity {
                name: name.to_string(),
                literal: value.to_string(),
            },
        )),
        Some('"' | '\'') => Err("malformed entity literal"),
        // SYSTEM / PUBLIC declarations
        _ => Ok((close + 1, Declaration::Verbatim(text.to_string()))),
    }
}

/// Byte offset of the `>` closing a declaration, skipping quoted literals.
fn declaration_end(rest: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, c) in rest.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(index),
            None => {}
        }
    }
    None
}
