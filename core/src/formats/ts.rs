/// Qt Linguist `.ts` codec
///
/// Messages are grouped in named `<context>` elements. A `type="unfinished"`
/// translation is fuzzy once it has text; `obsolete` and `vanished` mark
/// messages the sources no longer use.
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};

const BEFORE_TRANSLATION: &[&str] = &[
    "source",
    "oldsource",
    "comment",
    "oldcomment",
    "extracomment",
    "translatorcomment",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TsUnit {
    element: XmlElement,
    context: String,
    errors: UnitErrors,
}

impl TsUnit {
    pub fn new(source: &str, context: &str) -> Self {
        let indent = || XmlNode::Text("\n        ".to_string());
        let element = XmlElement {
            children: vec![
                indent(),
                XmlNode::Element(XmlElement::new("source").with_text(source)),
                indent(),
                XmlNode::Element(XmlElement::new("translation").with_attribute("type", "unfinished")),
                XmlNode::Text("\n    ".to_string()),
            ],
            ..XmlElement::new("message")
        };
        Self::from_element(element, context)
    }

    fn from_element(element: XmlElement, context: &str) -> Self {
        Self {
            element,
            context: context.to_string(),
            errors: UnitErrors::new(),
        }
    }

    /// Name of the enclosing `<context>`.
    pub fn context_name(&self) -> &str {
        &self.context
    }

    /// Disambiguation comment, distinguishing equal sources in one context.
    pub fn disambiguation(&self) -> Option<String> {
        self.element
            .child("comment")
            .map(XmlElement::text)
            .filter(|text| !text.is_empty())
    }

    fn translation(&self) -> Option<&XmlElement> {
        self.element.child("translation")
    }

    fn translation_type(&self) -> Option<&str> {
        self.translation().and_then(|t| t.attribute("type"))
    }

    fn set_translation_type(&mut self, kind: Option<&str>) {
        let translation = self.element.ensure_child("translation", BEFORE_TRANSLATION);
        match kind {
            Some(kind) => translation.set_attribute("type", kind),
            None => translation.remove_attribute("type"),
        }
    }

    fn set_comment(&mut self, name: &str, after: &[&str], text: &str) {
        if text.is_empty() {
            self.element.remove_children(name);
        } else {
            self.element.ensure_child(name, after).set_text(text);
        }
    }
}

impl TranslationUnit for TsUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.element.child("source").map(XmlElement::text).unwrap_or_default())
    }

    fn set_source(&mut self, source: Multistring) {
        self.element.ensure_child("source", &["location"]).set_text(source.as_str());
    }

    fn target(&self) -> Option<Multistring> {
        let translation = self.translation()?;
        let forms: Vec<String> = translation.children_named("numerusform").map(XmlElement::text).collect();
        if self.has_plural() && !forms.is_empty() {
            Some(Multistring::new(forms))
        } else {
            Some(Multistring::from(translation.text()))
        }
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        let Some(target) = target else {
            self.element.remove_children("translation");
            return;
        };
        if target.is_plural() {
            self.element.set_attribute("numerus", "yes");
        }
        let numerus = self.has_plural();
        let translation = self.element.ensure_child("translation", BEFORE_TRANSLATION);
        if numerus {
            translation.children = target
                .strings()
                .iter()
                .map(|form| XmlNode::Element(XmlElement::new("numerusform").with_text(form.as_str())))
                .collect();
        } else {
            translation.set_text(target.as_str());
        }
        if !target.is_empty() && translation.attribute("type") == Some("unfinished") {
            translation.remove_attribute("type");
        }
    }

    fn has_plural(&self) -> bool {
        self.element.attribute("numerus") == Some("yes")
    }

    /// The explicit `id`, else context and source (plus any disambiguation)
    /// joined by EOT.
    fn id(&self) -> String {
        if let Some(id) = self.element.attribute("id").filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        let mut id = self.source().as_str().to_string();
        if !self.context.is_empty() {
            id = format!("{}\u{4}{}", self.context, id);
        }
        if let Some(comment) = self.disambiguation() {
            id = format!("{}\u{4}{}", id, comment);
        }
        id
    }

    fn set_id(&mut self, id: &str) {
        self.element.set_attribute("id", id);
    }

    fn context(&self) -> Option<String> {
        Some(self.context.clone()).filter(|name| !name.is_empty())
    }

    fn locations(&self) -> Vec<String> {
        self.element
            .children_named("location")
            .filter_map(|location| {
                let filename = location.attribute("filename")?;
                Some(match location.attribute("line") {
                    Some(line) if !line.is_empty() => format!("{}:{}", filename, line),
                    _ => filename.to_string(),
                })
            })
            .collect()
    }

    fn add_location(&mut self, location: &str) {
        let (filename, line) = location.rsplit_once(':').unwrap_or((location, ""));
        let mut element = XmlElement::new("location").with_attribute("filename", filename);
        if !line.is_empty() {
            element.set_attribute("line", line);
        }
        if self.element.child("location").is_some() {
            self.element.insert_after(&["location"], element);
        } else {
            self.element.prepend_element(element);
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        let text = |name: &str| self.element.child(name).map(XmlElement::text).unwrap_or_default();
        match origin {
            Some(NoteOrigin::Translator) => text("translatorcomment"),
            Some(NoteOrigin::Developer) => text("extracomment"),
            Some(NoteOrigin::SourceCode) => String::new(),
            None => [text("extracomment"), text("translatorcomment")]
                .into_iter()
                .filter(|note| !note.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        let (name, after): (&str, &[&str]) = match origin {
            NoteOrigin::Translator => ("translatorcomment", &BEFORE_TRANSLATION[..5]),
            NoteOrigin::Developer | NoteOrigin::SourceCode => ("extracomment", &BEFORE_TRANSLATION[..4]),
        };
        let current = self.element.child(name).map(XmlElement::text).unwrap_or_default();
        let joined = [current.as_str(), text.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.set_comment(name, after, &joined);
    }

    fn remove_notes(&mut self) {
        self.element.remove_children("translatorcomment");
    }

    fn is_fuzzy(&self) -> bool {
        self.translation_type() == Some("unfinished") && self.target().map_or(false, |t| !t.is_empty())
    }

    fn mark_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            self.set_translation_type(Some("unfinished"));
        } else if self.translation_type() == Some("unfinished") {
            self.set_translation_type(None);
        }
    }

    fn is_review(&self) -> bool {
        self.is_fuzzy()
    }

    fn mark_review_needed(&mut self, needed: bool, explanation: Option<&str>) {
        self.mark_fuzzy(needed);
        if let (true, Some(explanation)) = (needed, explanation) {
            self.add_note(explanation, NoteOrigin::Translator);
        }
    }

    fn is_obsolete(&self) -> bool {
        matches!(self.translation_type(), Some("obsolete") | Some("vanished"))
    }

    fn make_obsolete(&mut self) {
        self.set_translation_type(Some("obsolete"));
    }

    fn resurrect(&mut self) {
        if self.is_obsolete() {
            self.set_translation_type(None);
        }
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }
}

fn new_document() -> XmlDocument {
    let root = XmlElement {
        children: vec![XmlNode::Text("\n".to_string())],
        ..XmlElement::new("TS").with_attribute("version", "2.1")
    };
    let mut document = XmlDocument::new(root);
    document.prolog.push(XmlNode::Markup("<!DOCTYPE TS>".to_string()));
    document.prolog.push(XmlNode::Text("\n".to_string()));
    document
}

#[derive(Debug)]
pub struct TsStore {
    core: StoreCore<TsUnit>,
    document: XmlDocument,
    /// Root child index of the `<context>` new messages go to.
    active: Option<usize>,
}

impl Default for TsStore {
    fn default() -> Self {
        Self {
            core: StoreCore::new(),
            document: new_document(),
            active: None,
        }
    }
}

impl TsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[TsUnit] {
        &self.core.units
    }

    fn context_position(&self, name: &str) -> Option<usize> {
        self.document.root.children.iter().position(|node| {
            matches!(node, XmlNode::Element(e) if e.local_name() == "context"
                && e.child("name").map(XmlElement::text).as_deref() == Some(name))
        })
    }

    pub fn context_names(&self) -> Vec<String> {
        self.document
            .root
            .children_named("context")
            .map(|context| context.child("name").map(XmlElement::text).unwrap_or_default())
            .collect()
    }

    /// Name of the context new messages go to.
    pub fn active_context(&self) -> Option<String> {
        let position = self.active?;
        match self.document.root.children.get(position)? {
            XmlNode::Element(context) => Some(context.child("name").map(XmlElement::text).unwrap_or_default()),
            _ => None,
        }
    }

    /// Send new messages to the named context, creating it when asked.
    pub fn switch_context(&mut self, name: &str, create: bool) -> bool {
        if let Some(position) = self.context_position(name) {
            self.active = Some(position);
            return true;
        }
        if !create {
            return false;
        }
        let context = XmlElement {
            children: vec![
                XmlNode::Text("\n    ".to_string()),
                XmlNode::Element(XmlElement::new("name").with_text(name)),
                XmlNode::Text("\n  ".to_string()),
            ],
            ..XmlElement::new("context")
        };
        self.document.root.append_element(context);
        self.active = self
            .document
            .root
            .children
            .iter()
            .rposition(|node| matches!(node, XmlNode::Element(_)));
        true
    }
}

impl TranslationStore for TsStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Ts
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let context = match self.active_context() {
            Some(name) => name,
            None => {
                self.switch_context("", true);
                String::new()
            }
        };
        let index = self.core.push(TsUnit::new(source.as_str(), &context));
        if source.is_plural() {
            if let Some(unit) = self.core.units.get_mut(index) {
                unit.element.set_attribute("numerus", "yes");
            }
        }
        if let Some(XmlNode::Element(context)) = self.active.and_then(|p| self.document.root.children.get_mut(p)) {
            context.append(XmlNode::Slot(index));
        }
        index
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let mut document = XmlDocument::parse(raw, FileFormat::Ts)?;
        if document.root.local_name() != "TS" {
            return Err(StoreError::parse(
                FileFormat::Ts,
                1,
                format!("root element is <{}>, expected <TS>", document.root.name),
            ));
        }

        self.core.clear();
        let mut units = Vec::new();
        for context in document.root.elements_mut().filter(|e| e.local_name() == "context") {
            let name = context.child("name").map(XmlElement::text).unwrap_or_default();
            for node in context.children.iter_mut() {
                if matches!(node, XmlNode::Element(e) if e.local_name() == "message") {
                    let slot = XmlNode::Slot(units.len());
                    if let XmlNode::Element(message) = std::mem::replace(node, slot) {
                        units.push(TsUnit::from_element(message, &name));
                    }
                }
            }
        }

        let language = |name: &str| {
            document
                .root
                .attribute(name)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        self.core.metadata.source_language = language("sourcelanguage");
        self.core.metadata.target_language = language("language");
        self.core.metadata.apply_options(options);
        self.active = document
            .root
            .children
            .iter()
            .rposition(|node| matches!(node, XmlNode::Element(e) if e.local_name() == "context"));
        self.document = document;
        for unit in units {
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(FileFormat::Ts))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut document = self.document.clone();
        if let Some(language) = &self.core.metadata.target_language {
            document.root.set_attribute("language", language.as_str());
        }
        if let Some(language) = &self.core.metadata.source_language {
            document.root.set_attribute("sourcelanguage", language.as_str());
        }
        let units = &self.core.units;
        Ok(document.write_with(&mut |index, out| {
            if let Some(unit) = units.get(index) {
                unit.element.write(out, &mut |_, _| {});
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="de_DE">
<context>
    <name>MainWindow</name>
    <message>
        <location filename="../src/mainwindow.cpp" line="42"/>
        <source>&amp;Open</source>
        <extracomment>File menu</extracomment>
        <translation>&amp;Öffnen</translation>
    </message>
    <message>
        <source>Close</source>
        <translation type="unfinished">Schliesen</translation>
    </message>
    <message numerus="yes">
        <source>%n file(s)</source>
        <translation>
            <numerusform>%n Datei</numerusform>
            <numerusform>%n Dateien</numerusform>
        </translation>
    </message>
    <message>
        <source>Gone</source>
        <translation type="vanished">Weg</translation>
    </message>
</context>
</TS>
"#;

    fn parse(raw: &str) -> TsStore {
        let mut store = TsStore::new();
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    #[test]
    fn reads_messages_with_context() {
        let store = parse(SAMPLE);
        assert_eq!(store.metadata().target_language.as_deref(), Some("de_DE"));
        let units = store.units();
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].source(), "&Open");
        assert_eq!(units[0].id(), "MainWindow\u{4}&Open");
        assert_eq!(units[0].locations(), vec!["../src/mainwindow.cpp:42"]);
        assert_eq!(units[0].notes(Some(NoteOrigin::Developer)), "File menu");
        assert!(units[0].is_translated());
        assert!(units[1].is_fuzzy());
        assert!(units[2].has_plural());
        assert_eq!(units[2].target(), Some(Multistring::plural(["%n Datei", "%n Dateien"])));
        assert!(units[3].is_obsolete());
    }

    #[test]
    fn round_trip_is_identical() {
        assert_eq!(parse(SAMPLE).serialize().unwrap(), SAMPLE);
    }

    #[test]
    fn untranslated_unfinished_is_not_fuzzy() {
        let mut store = TsStore::new();
        let index = store.add_source_unit("Save".into());
        let unit = store.unit_mut(index).unwrap();
        assert!(!unit.is_fuzzy());
        assert!(!unit.is_translated());
        unit.set_target(Some("Speichern".into()));
        assert!(unit.is_translated());
        unit.mark_fuzzy(true);
        assert!(unit.is_fuzzy());
    }

    #[test]
    fn new_messages_join_the_last_context() {
        let mut store = parse(SAMPLE);
        store.add_source_unit("Quit".into());
        let again = parse(&store.serialize().unwrap());
        assert_eq!(again.unit_count(), 5);
        assert_eq!(again.units()[4].context_name(), "MainWindow");
        assert_eq!(again.context_names(), vec!["MainWindow"]);
    }

    #[test]
    fn contexts_can_be_created() {
        let mut store = TsStore::new();
        assert!(!store.switch_context("Dialog", false));
        assert!(store.switch_context("Dialog", true));
        let index = store.add_source_unit("OK".into());
        store.unit_mut(index).unwrap().add_location("dialog.cpp:7");
        let out = store.serialize().unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE TS>\n<TS"));
        let again = parse(&out);
        assert_eq!(again.units()[0].id(), "Dialog\u{4}OK");
        assert_eq!(again.units()[0].locations(), vec!["dialog.cpp:7"]);
    }

    #[test]
    fn translator_comments_are_notes() {
        let mut unit = TsUnit::new("Print", "Main");
        unit.add_note("Keep it short", NoteOrigin::Translator);
        unit.add_note("Toolbar", NoteOrigin::Developer);
        assert_eq!(unit.notes(None), "Toolbar\nKeep it short");
        unit.remove_notes();
        assert_eq!(unit.notes(None), "Toolbar");
    }

    #[test]
    fn plural_targets_become_numerus_forms() {
        let mut unit = TsUnit::new("%n item(s)", "Main");
        unit.set_target(Some(Multistring::plural(["%n Element", "%n Elemente"])));
        assert!(unit.has_plural());
        assert_eq!(unit.target().unwrap().len(), 2);
    }
}
