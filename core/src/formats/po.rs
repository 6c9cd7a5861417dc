/// Gettext PO/POT codec
///
/// Handles msgctxt identities, plural entries (`msgid_plural` / `msgstr[n]`),
/// the header entry, every comment kind and obsolete `#~` entries.
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};
use once_cell::sync::Lazy;
use regex::Regex;

static NPLURALS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nplurals\s*=\s*(\d+)").expect("valid nplurals regex"));

static MSGSTR_INDEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^msgstr\[(\d+)\]").expect("valid msgstr index regex"));

const REVIEW_MARKER: &str = "(review)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoUnit {
    translator_comments: Vec<String>,
    developer_comments: Vec<String>,
    locations: Vec<String>,
    flags: Vec<String>,
    previous: Vec<String>,
    msgctxt: Option<String>,
    msgid: String,
    msgid_plural: Option<String>,
    msgstr: Vec<String>,
    obsolete: bool,
    errors: UnitErrors,
}

impl PoUnit {
    pub fn new(source: Multistring) -> Self {
        let mut unit = Self {
            msgstr: vec![String::new()],
            ..Self::default()
        };
        unit.set_source(source);
        unit
    }

    pub fn msgctxt(&self) -> Option<&str> {
        self.msgctxt.as_deref()
    }

    pub fn set_context(&mut self, context: Option<String>) {
        self.msgctxt = context;
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn add_flag(&mut self, flag: &str) {
        if !self.flags.iter().any(|f| f == flag) {
            self.flags.push(flag.to_string());
        }
    }

    pub fn remove_flag(&mut self, flag: &str) {
        self.flags.retain(|f| f != flag);
    }

    /// `#|` lines describing the previous source text.
    pub fn previous(&self) -> &[String] {
        &self.previous
    }

    fn write(&self, out: &mut String) {
        for comment in &self.translator_comments {
            push_comment(out, "#", comment);
        }
        for comment in &self.developer_comments {
            push_comment(out, "#.", comment);
        }
        if !self.locations.is_empty() {
            out.push_str("#: ");
            out.push_str(&self.locations.join(" "));
            out.push('\n');
        }
        if !self.flags.is_empty() {
            out.push_str("#, ");
            out.push_str(&self.flags.join(", "));
            out.push('\n');
        }

        let prefix = if self.obsolete { "#~ " } else { "" };
        for line in &self.previous {
            out.push_str(if self.obsolete { "#~| " } else { "#| " });
            out.push_str(line);
            out.push('\n');
        }
        if let Some(context) = &self.msgctxt {
            push_field(out, prefix, "msgctxt", context);
        }
        push_field(out, prefix, "msgid", &self.msgid);
        match &self.msgid_plural {
            Some(plural) => {
                push_field(out, prefix, "msgid_plural", plural);
                for (index, form) in self.msgstr.iter().enumerate() {
                    push_field(out, prefix, &format!("msgstr[{}]", index), form);
                }
            }
            None => {
                let first = self.msgstr.first().map(String::as_str).unwrap_or("");
                push_field(out, prefix, "msgstr", first);
            }
        }
    }
}

impl TranslationUnit for PoUnit {
    fn source(&self) -> Multistring {
        match &self.msgid_plural {
            Some(plural) => Multistring::new(vec![self.msgid.clone(), plural.clone()]),
            None => Multistring::from(self.msgid.as_str()),
        }
    }

    fn set_source(&mut self, source: Multistring) {
        let mut forms = source.into_strings().into_iter();
        self.msgid = forms.next().unwrap_or_default();
        self.msgid_plural = forms.next();
        if self.msgid_plural.is_some() {
            let len = self.msgstr.len().max(2);
            self.msgstr.resize(len, String::new());
        } else {
            self.msgstr.truncate(1);
            if self.msgstr.is_empty() {
                self.msgstr.push(String::new());
            }
        }
    }

    fn target(&self) -> Option<Multistring> {
        if self.msgstr.iter().all(|s| s.is_empty()) {
            return None;
        }
        if self.has_plural() {
            Some(Multistring::new(self.msgstr.clone()))
        } else {
            Some(Multistring::from(self.msgstr[0].as_str()))
        }
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        let plural = self.has_plural();
        match target {
            Some(value) if plural => {
                let len = value.len().max(2);
                self.msgstr = value.resized(len).into_strings();
            }
            Some(value) => self.msgstr = vec![value.as_str().to_string()],
            None => {
                let len = if plural { self.msgstr.len().max(2) } else { 1 };
                self.msgstr = vec![String::new(); len];
            }
        }
    }

    fn has_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }

    fn id(&self) -> String {
        match &self.msgctxt {
            Some(context) => format!("{}\u{4}{}", context, self.msgid),
            None => self.msgid.clone(),
        }
    }

    fn context(&self) -> Option<String> {
        self.msgctxt.clone()
    }

    fn locations(&self) -> Vec<String> {
        self.locations.clone()
    }

    fn add_location(&mut self, location: &str) {
        // Locations are space separated on the `#:` line
        for part in location.split_whitespace() {
            self.locations.push(part.to_string());
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            Some(NoteOrigin::Translator) => {
                join_notes(self.translator_comments.iter().map(String::as_str))
            }
            Some(NoteOrigin::Developer) => {
                join_notes(self.developer_comments.iter().map(String::as_str))
            }
            Some(NoteOrigin::SourceCode) => String::new(),
            None => join_notes(
                self.translator_comments
                    .iter()
                    .chain(self.developer_comments.iter())
                    .map(String::as_str),
            ),
        }
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        let target = match origin {
            NoteOrigin::Translator => &mut self.translator_comments,
            NoteOrigin::Developer | NoteOrigin::SourceCode => &mut self.developer_comments,
        };
        target.extend(text.lines().map(str::to_string));
    }

    fn remove_notes(&mut self) {
        self.translator_comments.clear();
        self.developer_comments.clear();
    }

    fn is_fuzzy(&self) -> bool {
        self.flags.iter().any(|f| f == "fuzzy")
    }

    fn mark_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            self.add_flag("fuzzy");
        } else {
            self.remove_flag("fuzzy");
        }
    }

    fn is_obsolete(&self) -> bool {
        self.obsolete
    }

    fn make_obsolete(&mut self) {
        if !self.is_header() {
            self.obsolete = true;
        }
    }

    fn resurrect(&mut self) {
        self.obsolete = false;
    }

    fn is_review(&self) -> bool {
        self.translator_comments
            .iter()
            .any(|c| c.starts_with(REVIEW_MARKER))
    }

    fn mark_review_needed(&mut self, needed: bool, explanation: Option<&str>) {
        self.translator_comments
            .retain(|c| !c.starts_with(REVIEW_MARKER));
        if needed {
            let comment = match explanation {
                Some(text) if !text.is_empty() => format!("{} {}", REVIEW_MARKER, text),
                _ => REVIEW_MARKER.to_string(),
            };
            self.translator_comments.push(comment);
        }
    }

    fn is_header(&self) -> bool {
        self.msgid.is_empty()
            && self.msgctxt.is_none()
            && !self.obsolete
            && self.msgstr.first().map_or(false, |s| !s.is_empty())
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }
}

#[derive(Debug)]
pub struct PoStore {
    core: StoreCore<PoUnit>,
    template: bool,
}

impl PoStore {
    pub fn new() -> Self {
        Self {
            core: StoreCore::new(),
            template: false,
        }
    }

    /// An empty POT template store.
    pub fn template() -> Self {
        Self {
            core: StoreCore::new(),
            template: true,
        }
    }

    pub fn units(&self) -> &[PoUnit] {
        &self.core.units
    }

    pub fn header(&self) -> Option<&PoUnit> {
        self.core.units.iter().find(|u| u.is_header())
    }

    pub fn header_field(&self, key: &str) -> Option<String> {
        self.header_fields()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Number of plural forms declared by the header, if any.
    pub fn nplurals(&self) -> Option<usize> {
        let forms = self.header_field("Plural-Forms")?;
        NPLURALS_RE
            .captures(&forms)
            .and_then(|caps| caps[1].parse().ok())
    }

    fn apply_header_metadata(&mut self) {
        if let Some(language) = self.header_field("Language").filter(|l| !l.is_empty()) {
            self.core.metadata.target_language = Some(language);
        }
    }
}

impl Default for PoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationStore for PoStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        if self.template {
            FileFormat::Pot
        } else {
            FileFormat::Po
        }
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(PoUnit::new(source))
    }

    /// `Key: Value` pairs of the header entry, in order.
    fn header_fields(&self) -> Vec<(String, String)> {
        let Some(text) = self.header().and_then(|header| header.msgstr.first()) else {
            return Vec::new();
        };
        text.lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                Some((key.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// Set or add a header field, creating the header entry when missing.
    fn set_header_field(&mut self, key: &str, value: &str) {
        let mut fields = self.header_fields();
        match fields.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(field) => field.1 = value.to_string(),
            None => fields.push((key.to_string(), value.to_string())),
        }
        let text: String = fields
            .iter()
            .map(|(k, v)| format!("{}: {}\n", k, v))
            .collect();

        match self.core.units.iter_mut().find(|u| u.is_header()) {
            Some(header) => header.msgstr = vec![text],
            None => {
                let mut header = PoUnit::new(Multistring::default());
                header.msgstr = vec![text];
                self.core.units.insert(0, header);
                self.core.invalidate_index();
            }
        }
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        for unit in parse_units(raw, self.format())? {
            self.core.push(unit);
        }
        self.apply_header_metadata();
        Ok(self.core.check_duplicates(self.format()))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for (index, unit) in self.core.units.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            unit.write(&mut out);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    None,
    Context,
    Id,
    IdPlural,
    Str(usize),
}

struct UnitBuilder {
    unit: PoUnit,
    field: Field,
    has_msgid: bool,
    has_content: bool,
}

impl UnitBuilder {
    fn new() -> Self {
        Self {
            unit: PoUnit::default(),
            field: Field::None,
            has_msgid: false,
            has_content: false,
        }
    }

    /// A keyword after the msgstr block starts the next entry.
    fn in_msgstr(&self) -> bool {
        matches!(self.field, Field::Str(_))
    }

    fn append(&mut self, text: String) {
        let unit = &mut self.unit;
        match self.field {
            Field::None => {}
            Field::Context => unit.msgctxt.get_or_insert_with(String::new).push_str(&text),
            Field::Id => unit.msgid.push_str(&text),
            Field::IdPlural => unit
                .msgid_plural
                .get_or_insert_with(String::new)
                .push_str(&text),
            Field::Str(index) => {
                if unit.msgstr.len() <= index {
                    unit.msgstr.resize(index + 1, String::new());
                }
                unit.msgstr[index].push_str(&text);
            }
        }
    }

    fn finish(self, units: &mut Vec<PoUnit>) {
        if !self.has_msgid {
            if self.has_content {
                log::debug!("dropping PO comments not attached to an entry");
            }
            return;
        }
        let mut unit = self.unit;
        if unit.msgstr.is_empty() {
            unit.msgstr.push(String::new());
        }
        if unit.msgid_plural.is_some() && unit.msgstr.len() < 2 {
            unit.msgstr.resize(2, String::new());
        }
        units.push(unit);
    }
}

fn parse_units(raw: &str, format: FileFormat) -> Result<Vec<PoUnit>, StoreError> {
    let mut units = Vec::new();
    let mut builder = UnitBuilder::new();

    for (index, raw_line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let mut line = raw_line.trim();
        if line.is_empty() {
            if builder.has_msgid {
                std::mem::replace(&mut builder, UnitBuilder::new()).finish(&mut units);
            }
            continue;
        }

        let mut obsolete = false;
        if let Some(rest) = line.strip_prefix("#~") {
            obsolete = true;
            if let Some(previous) = rest.strip_prefix('|') {
                if builder.in_msgstr() {
                    std::mem::replace(&mut builder, UnitBuilder::new()).finish(&mut units);
                }
                builder.unit.previous.push(previous.trim_start().to_string());
                builder.unit.obsolete = true;
                builder.has_content = true;
                continue;
            }
            line = rest.trim_start();
            if line.is_empty() {
                continue;
            }
        }

        if !obsolete && line.starts_with('#') {
            if builder.in_msgstr() {
                std::mem::replace(&mut builder, UnitBuilder::new()).finish(&mut units);
            }
            parse_comment(&mut builder.unit, line);
            builder.has_content = true;
            continue;
        }

        if line.starts_with('"') {
            if builder.field == Field::None {
                return Err(StoreError::parse(
                    format,
                    line_no,
                    "string continuation outside of an entry",
                ));
            }
            builder.append(unquote(line, format, line_no)?);
            continue;
        }

        let (keyword, rest) = match line.find(|c: char| c.is_whitespace() || c == '"') {
            Some(pos) => (&line[..pos], line[pos..].trim_start()),
            None => (line, ""),
        };

        let field = match keyword {
            "msgctxt" => Field::Context,
            "msgid" => Field::Id,
            "msgid_plural" => Field::IdPlural,
            "msgstr" => Field::Str(0),
            _ => match MSGSTR_INDEX_RE.captures(keyword) {
                Some(caps) => Field::Str(caps[1].parse().map_err(|_| {
                    StoreError::parse(format, line_no, "invalid plural index")
                })?),
                None => {
                    return Err(StoreError::parse(
                        format,
                        line_no,
                        format!("unexpected keyword {:?}", keyword),
                    ))
                }
            },
        };

        let starts_entry = matches!(field, Field::Context | Field::Id);
        let after_context = builder.field == Field::Context;
        if starts_entry && builder.has_msgid && !(field == Field::Id && after_context) {
            std::mem::replace(&mut builder, UnitBuilder::new()).finish(&mut units);
        }

        builder.field = field;
        builder.has_content = true;
        if obsolete {
            builder.unit.obsolete = true;
        }
        match field {
            Field::Context => builder.unit.msgctxt = Some(String::new()),
            Field::Id => builder.has_msgid = true,
            Field::IdPlural => builder.unit.msgid_plural = Some(String::new()),
            Field::Str(_) | Field::None => {}
        }
        if !rest.is_empty() {
            builder.append(unquote(rest, format, line_no)?);
        }
    }

    builder.finish(&mut units);
    Ok(units)
}

fn parse_comment(unit: &mut PoUnit, line: &str) {
    let marker = line.get(..2).unwrap_or(line);
    let text = line.get(2..).unwrap_or("");
    match marker {
        "#." => unit.developer_comments.push(strip_one_space(text)),
        "#:" => unit
            .locations
            .extend(text.split_whitespace().map(str::to_string)),
        "#," => unit.flags.extend(
            text.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        ),
        "#|" => unit.previous.push(strip_one_space(text)),
        _ => unit.translator_comments.push(strip_one_space(&line[1..])),
    }
}

fn strip_one_space(text: &str) -> String {
    text.strip_prefix(' ').unwrap_or(text).to_string()
}

/// Decode one `"..."` literal.
fn unquote(literal: &str, format: FileFormat, line_no: usize) -> Result<String, StoreError> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|_| literal.len() >= 2)
        .ok_or_else(|| StoreError::parse(format, line_no, "unterminated string"))?;
    Ok(unescape(inner))
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
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn push_comment(out: &mut String, marker: &str, text: &str) {
    out.push_str(marker);
    if !text.is_empty() {
        out.push(' ');
        out.push_str(text);
    }
    out.push('\n');
}

/// Writes `keyword "text"`, splitting multi-line text after each newline.
fn push_field(out: &mut String, prefix: &str, keyword: &str, text: &str) {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() <= 1 {
        out.push_str(&format!("{}{} \"{}\"\n", prefix, keyword, escape(text)));
        return;
    }
    out.push_str(&format!("{}{} \"\"\n", prefix, keyword));
    for line in lines {
        out.push_str(&format!("{}\"{}\"\n", prefix, escape(line)));
    }
}
