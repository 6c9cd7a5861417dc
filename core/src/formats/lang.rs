/// Mozilla `.lang` codec
///
/// ```text
/// ## active ##
/// # Developer note
/// ;Source string
/// Translated string
/// ```
///
/// A translation equal to its source counts as untranslated unless it is
/// suffixed with ` {ok}`. Lines starting with `##` are file tags and are
/// carried with the entry that follows them. Entries are one line each, so
/// line breaks inside a string are written as spaces.
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::{single_line, FileFormat};
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{join_notes, NoteOrigin, TranslationUnit, UnitErrors};

const OK_MARKER: &str = "{ok}";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangUnit {
    pub source: String,
    pub target: Option<String>,
    tags: Vec<String>,
    notes: Vec<String>,
    obsolete: bool,
    errors: UnitErrors,
}

impl LangUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    fn write(&self, out: &mut String) {
        for tag in &self.tags {
            out.push_str(tag);
            out.push('\n');
        }
        if self.source.is_empty() {
            return;
        }
        for note in &self.notes {
            out.push_str(&format!("# {}\n", note));
        }
        let source = single_line(FileFormat::Lang, &self.source);
        out.push_str(&format!(";{}\n", source));
        match self.target.as_deref() {
            Some(target) if target == self.source => {
                out.push_str(&format!("{} {}\n", source, OK_MARKER))
            }
            Some(target) => out.push_str(&format!("{}\n", single_line(FileFormat::Lang, target))),
            None => out.push_str(&format!("{}\n", source)),
        }
        out.push('\n');
    }
}

impl TranslationUnit for LangUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.source.as_str())
    }

    fn set_source(&mut self, source: Multistring) {
        self.source = source.as_str().to_string();
    }

    fn target(&self) -> Option<Multistring> {
        self.target.as_deref().map(Multistring::from)
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        self.target = target
            .map(|t| t.as_str().to_string())
            .filter(|t| !t.is_empty());
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => join_notes(self.notes.iter().map(String::as_str)),
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        self.notes.extend(text.lines().map(str::to_string));
    }

    fn remove_notes(&mut self) {
        self.notes.clear();
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
pub struct LangStore {
    core: StoreCore<LangUnit>,
}

impl LangStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[LangUnit] {
        &self.core.units
    }
}

impl TranslationStore for LangStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Lang
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(LangUnit::new(source.as_str()))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);

        let mut pending = LangUnit::default();
        let mut awaiting_target = false;
        for line in raw.lines() {
            if awaiting_target {
                awaiting_target = false;
                let (text, ok) = match line.strip_suffix(OK_MARKER) {
                    Some(rest) => (rest.trim_end(), true),
                    None => (line, false),
                };
                if ok || text != pending.source {
                    pending.target = Some(text.to_string()).filter(|t| !t.is_empty());
                }
                self.core.push(std::mem::take(&mut pending));
                continue;
            }

            if let Some(source) = line.strip_prefix(';') {
                pending.source = source.to_string();
                awaiting_target = true;
            } else if line.starts_with("##") {
                pending.tags.push(line.to_string());
            } else if let Some(note) = line.strip_prefix('#') {
                pending.notes.push(note.trim().to_string());
            }
        }

        if awaiting_target || !pending.tags.is_empty() {
            self.core.push(pending);
        }
        Ok(self.core.check_duplicates(FileFormat::Lang))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        for unit in &self.core.units {
            unit.write(&mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "## active ##\n# Button label\n;Download\nHerunterladen\n\n;Firefox\nFirefox {ok}\n\n;Privacy\nPrivacy\n\n";

    fn parse(raw: &str) -> LangStore {
        let mut store = LangStore::new();
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    #[test]
    fn parses_entries() {
        let store = parse(SAMPLE);
        let units = store.units();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].source, "Download");
        assert_eq!(units[0].notes(None), "Button label");
        assert_eq!(units[0].target().unwrap(), "Herunterladen");
        assert_eq!(units[1].target().unwrap(), "Firefox");
        assert!(units[1].is_translated());
        assert!(units[2].target().is_none());
    }

    #[test]
    fn serialization_is_stable() {
        assert_eq!(parse(SAMPLE).serialize().unwrap(), SAMPLE);
    }

    #[test]
    fn identical_translation_gets_ok_marker() {
        let mut store = LangStore::new();
        let index = store.add_source_unit("Pocket".into());
        store.unit_mut(index).unwrap().set_target(Some("Pocket".into()));
        assert_eq!(store.serialize().unwrap(), ";Pocket\nPocket {ok}\n\n");
    }

    #[test]
    fn line_breaks_do_not_split_entries() {
        let mut store = LangStore::new();
        let index = store.add_source_unit("Two\nlines".into());
        store.unit_mut(index).unwrap().set_target(Some("Twee\nreëls".into()));
        store.add_source_unit("Next".into());

        let out = store.serialize().unwrap();
        assert_eq!(out, ";Two lines\nTwee reëls\n\n;Next\nNext\n\n");
        let again = parse(&out);
        assert_eq!(again.units().len(), 2);
        assert_eq!(again.units()[0].target.as_deref(), Some("Twee reëls"));
        assert_eq!(again.units()[1].target, None);
        assert_eq!(again.serialize().unwrap(), out);
    }
}
