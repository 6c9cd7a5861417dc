/// Legacy INI codec
/// Keys are identified as `[section]key`; section headers, comments and other
/// lines are preserved in front of the entry that follows them.
///
/// Keys and values are read trimmed, so surrounding whitespace does not
/// survive a round trip, and line breaks are written as spaces.
use super::monolingual::Value;
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::{single_line, FileFormat};
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};

#[derive(Debug, Clone, PartialEq)]
pub struct IniUnit {
    section: String,
    key: String,
    delimiter: String,
    value: Value,
    prefix: Vec<String>,
    errors: UnitErrors,
}

impl IniUnit {
    pub fn new(section: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            delimiter: "=".to_string(),
            value,
            prefix: Vec::new(),
            errors: UnitErrors::new(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn write(&self, out: &mut String) {
        for line in &self.prefix {
            out.push_str(line);
            out.push('\n');
        }
        if !self.key.is_empty() {
            out.push_str(&format!(
                "{}{}{}\n",
                single_line(FileFormat::Ini, &self.key),
                self.delimiter,
                single_line(FileFormat::Ini, &self.value.text)
            ));
        }
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(';') || trimmed.starts_with('#')
}

impl TranslationUnit for IniUnit {
    monolingual_unit_methods!();

    fn id(&self) -> String {
        format!("[{}]{}", self.section, self.key)
    }

    fn set_id(&mut self, id: &str) {
        match id.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
            Some((section, key)) => {
                self.section = section.to_string();
                self.key = key.to_string();
            }
            None => self.key = id.to_string(),
        }
    }

    fn locations(&self) -> Vec<String> {
        if self.key.is_empty() {
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
                    .filter(|line| is_comment(line))
                    .map(|line| line.trim_start()[1..].trim()),
            ),
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        self.prefix
            .extend(text.lines().map(|line| format!("; {}", line)));
    }

    fn remove_notes(&mut self) {
        self.prefix.retain(|line| !is_comment(line));
    }
}

#[derive(Debug, Default)]
pub struct IniStore {
    core: StoreCore<IniUnit>,
    template: bool,
}

impl IniStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[IniUnit] {
        &self.core.units
    }
}

impl TranslationStore for IniStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Ini
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let section = self
            .core
            .units
            .iter()
            .rev()
            .find(|u| !u.key.is_empty())
            .map(|u| u.section.clone())
            .unwrap_or_default();
        let unit = IniUnit::new(section, source.as_str(), Value::new(source.as_str(), self.template));
        self.core.push(unit)
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.template = options.template;

        let mut section = String::new();
        let mut prefix = Vec::new();
        for line in raw.lines() {
            let trimmed = line.trim();

            // Section header
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                prefix.push(line.to_string());
                continue;
            }

            // Key=value pair
            match line.find('=') {
                Some(pos) if !is_comment(line) && !line[..pos].trim().is_empty() => {
                    let key_end = line[..pos].trim_end().len();
                    let value = &line[pos + 1..];
                    let value_start = value.len() - value.trim_start().len();
                    let mut unit = IniUnit::new(
                        section.clone(),
                        line[..key_end].trim_start(),
                        Value::new(value.trim(), options.template),
                    );
                    unit.delimiter = format!("{}={}", &line[key_end..pos], &value[..value_start]);
                    unit.prefix = std::mem::take(&mut prefix);
                    self.core.push(unit);
                }
                _ => prefix.push(line.to_string()),
            }
        }

        if !prefix.is_empty() {
            let mut unit = IniUnit::new(section, "", Value::new("", options.template));
            unit.prefix = prefix;
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(FileFormat::Ini))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for unit in &self.core.units {
            unit.write(&mut out);
        }
        Ok(out)
    }
}
