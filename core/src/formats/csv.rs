/// Translation spreadsheet codec (comma separated, RFC 4180 quoting)
///
/// A header row maps columns by name. Without a recognisable header the
/// columns are taken positionally as location, source, target.
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Location,
    Source,
    Target,
    Context,
    TranslatorComments,
    DeveloperComments,
    Fuzzy,
}

impl Column {
    const WRITE_ORDER: [Column; 7] = [
        Column::Location,
        Column::Source,
        Column::Target,
        Column::Context,
        Column::TranslatorComments,
        Column::DeveloperComments,
        Column::Fuzzy,
    ];

    fn from_header(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "location" | "locations" | "source location" => Some(Self::Location),
            "source" | "original" | "untranslated" | "msgid" => Some(Self::Source),
            "target" | "translation" | "translated" | "msgstr" => Some(Self::Target),
            "context" | "msgctxt" => Some(Self::Context),
            "translator comments" | "translator comment" | "notes" => Some(Self::TranslatorComments),
            "developer comments" | "developer comment" | "extracted comments" => {
                Some(Self::DeveloperComments)
            }
            "fuzzy" | "state" => Some(Self::Fuzzy),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Source => "source",
            Self::Target => "target",
            Self::Context => "context",
            Self::TranslatorComments => "translator_comments",
            Self::DeveloperComments => "developer_comments",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// Split CSV text into records of unquoted fields.
///
/// Quoted fields may hold separators, doubled quotes and line breaks.
pub fn read_records(raw: &str) -> Result<Vec<Vec<String>>, StoreError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                quoted = true;
                quote_line = line;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record.clear();
            }
            _ => field.push(c),
        }
    }

    if quoted {
        return Err(StoreError::parse(
            FileFormat::Csv,
            quote_line,
            "unterminated quoted field",
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Quote every field, doubling embedded quotes.
pub fn write_record(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvUnit {
    pub source: String,
    pub target: String,
    pub context: String,
    pub locations: Vec<String>,
    pub translator_comments: String,
    pub developer_comments: String,
    pub fuzzy: bool,
    obsolete: bool,
    errors: UnitErrors,
}

impl CsvUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    fn field(&self, column: Column) -> String {
        match column {
            Column::Location => self.locations.join(" "),
            Column::Source => self.source.clone(),
            Column::Target => self.target.clone(),
            Column::Context => self.context.clone(),
            Column::TranslatorComments => self.translator_comments.clone(),
            Column::DeveloperComments => self.developer_comments.clone(),
            Column::Fuzzy => if self.fuzzy { "True" } else { "" }.to_string(),
        }
    }

    fn set_field(&mut self, column: Column, value: String) {
        match column {
            Column::Location => {
                self.locations = value.split_whitespace().map(str::to_string).collect()
            }
            Column::Source => self.source = value,
            Column::Target => self.target = value,
            Column::Context => self.context = value,
            Column::TranslatorComments => self.translator_comments = value,
            Column::DeveloperComments => self.developer_comments = value,
            Column::Fuzzy => {
                let value = value.trim().to_lowercase();
                self.fuzzy = matches!(value.as_str(), "true" | "yes" | "1" | "fuzzy");
            }
        }
    }
}

fn append_note(notes: &mut String, text: &str) {
    if !notes.is_empty() {
        notes.push('\n');
    }
    notes.push_str(text);
}

impl TranslationUnit for CsvUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.source.as_str())
    }

    fn set_source(&mut self, source: Multistring) {
        self.source = source.as_str().to_string();
    }

    fn target(&self) -> Option<Multistring> {
        (!self.target.is_empty()).then(|| Multistring::from(self.target.as_str()))
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

    fn locations(&self) -> Vec<String> {
        self.locations.clone()
    }

    fn add_location(&mut self, location: &str) {
        self.locations.push(location.to_string());
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            Some(NoteOrigin::Translator) => self.translator_comments.clone(),
            Some(NoteOrigin::Developer) => self.developer_comments.clone(),
            Some(NoteOrigin::SourceCode) => String::new(),
            None => join_notes(
                [&self.developer_comments, &self.translator_comments]
                    .into_iter()
                    .filter(|notes| !notes.is_empty())
                    .map(String::as_str),
            ),
        }
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        match origin {
            NoteOrigin::Translator => append_note(&mut self.translator_comments, text),
            _ => append_note(&mut self.developer_comments, text),
        }
    }

    fn remove_notes(&mut self) {
        self.translator_comments.clear();
        self.developer_comments.clear();
    }

    fn is_fuzzy(&self) -> bool {
        self.fuzzy && !self.target.is_empty()
    }

    fn mark_fuzzy(&mut self, fuzzy: bool) {
        self.fuzzy = fuzzy;
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
pub struct CsvStore {
    core: StoreCore<CsvUnit>,
}

impl CsvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[CsvUnit] {
        &self.core.units
    }
}

/// Column layout from the first record, when it reads as a header.
fn header_columns(record: &[String]) -> Option<Vec<Option<Column>>> {
    let columns: Vec<Option<Column>> = record.iter().map(|name| Column::from_header(name)).collect();
    columns
        .contains(&Some(Column::Source))
        .then_some(columns)
}

impl TranslationStore for CsvStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(CsvUnit::new(source.as_str()))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);

        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut records = read_records(raw)?.into_iter().peekable();
        let columns = match records.peek().and_then(|first| header_columns(first)) {
            Some(columns) => {
                records.next();
                columns
            }
            None => vec![
                Some(Column::Location),
                Some(Column::Source),
                Some(Column::Target),
            ],
        };

        for record in records {
            let mut unit = CsvUnit::default();
            for (column, value) in columns.iter().zip(record) {
                if let Some(column) = column {
                    unit.set_field(*column, value);
                }
            }
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(FileFormat::Csv))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = write_record(&Column::WRITE_ORDER.map(Column::name));
        out.push('\n');
        for unit in &self.core.units {
            let fields = Column::WRITE_ORDER.map(|column| unit.field(column));
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            out.push_str(&write_record(&fields));
            out.push('\n');
        }
        Ok(out)
    }
}
