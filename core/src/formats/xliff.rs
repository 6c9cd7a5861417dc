/// XLIFF 1.x codec
///
/// Every `<trans-unit>` is a unit. Fuzzy state lives in `approved="no"`, review
/// state in the target's `state="needs-review-*"`, locations in `po-reference`
/// context groups and notes in `<note from="...">`. New units are appended to
/// the body of the active `<file>`.
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, StoreMetadata, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};

pub const XLIFF_NAMESPACE: &str = "urn:oasis:names:tc:xliff:document:1.1";

const DEFAULT_FILE: &str = "NoName";

fn note_origin(from: Option<&str>) -> NoteOrigin {
    match from {
        Some(from) if from.contains("translator") => NoteOrigin::Translator,
        Some(from) if from.contains("source") => NoteOrigin::SourceCode,
        _ => NoteOrigin::Developer,
    }
}

/// A `<trans-unit>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct XliffUnit {
    pub(crate) element: XmlElement,
    obsolete: bool,
    errors: UnitErrors,
}

impl XliffUnit {
    pub fn new(source: &str) -> Self {
        let element = XmlElement::new("trans-unit")
            .with_attribute("xml:space", "preserve")
            .with_child(XmlElement::new("source").with_text(source));
        Self::from_element(element)
    }

    pub(crate) fn from_element(element: XmlElement) -> Self {
        Self {
            element,
            obsolete: false,
            errors: UnitErrors::new(),
        }
    }

    pub fn element(&self) -> &XmlElement {
        &self.element
    }

    pub fn restype(&self) -> Option<&str> {
        self.element.attribute("restype")
    }

    pub fn is_approved(&self) -> bool {
        self.element.attribute("approved") == Some("yes")
    }

    pub fn mark_approved(&mut self, approved: bool) {
        if approved {
            self.element.set_attribute("approved", "yes");
        } else if self.element.attribute("approved").is_some() {
            self.element.set_attribute("approved", "no");
        }
    }

    fn target_element(&self) -> Option<&XmlElement> {
        self.element.child("target")
    }

    fn target_state(&self) -> Option<&str> {
        self.target_element().and_then(|target| target.attribute("state"))
    }

    fn set_target_state(&mut self, state: Option<&str>) {
        if let Some(target) = self.element.child_mut("target") {
            match state {
                Some(state) => target.set_attribute("state", state),
                None => {
                    target.remove_attribute("state");
                    target.remove_attribute("state-qualifier");
                }
            }
        }
    }

    pub(crate) fn mark_translated(&mut self) {
        if let Some(target) = self.element.child_mut("target") {
            target.remove_attribute("state-qualifier");
            target.set_attribute("state", "translated");
        }
    }

    /// `(context-type, text)` pairs of every context group with this name.
    pub fn context_groups(&self, name: &str) -> Vec<Vec<(String, String)>> {
        self.element
            .children_named("context-group")
            .filter(|group| group.attribute("name") == Some(name))
            .map(|group| {
                group
                    .children_named("context")
                    .map(|context| {
                        (
                            context.attribute("context-type").unwrap_or_default().to_string(),
                            context.text(),
                        )
                    })
                    .collect()
            })
            .collect()
    }

    pub fn add_context_group(&mut self, name: &str, purpose: Option<&str>, contexts: &[(&str, &str)]) {
        let mut group = XmlElement::new("context-group").with_attribute("name", name);
        if let Some(purpose) = purpose {
            group.set_attribute("purpose", purpose);
        }
        for (kind, text) in contexts {
            group = group.with_child(
                XmlElement::new("context")
                    .with_attribute("context-type", *kind)
                    .with_text(*text),
            );
        }
        self.element.append_element(group);
    }

    /// Alternative translations as `(origin, target)`.
    pub fn alt_trans(&self) -> Vec<(Option<String>, String)> {
        self.element
            .children_named("alt-trans")
            .map(|alt| {
                (
                    alt.attribute("origin").map(str::to_string),
                    alt.child("target").map(XmlElement::text).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn add_alt_trans(&mut self, target: &str, origin: Option<&str>) {
        let mut alt = XmlElement::new("alt-trans").with_child(XmlElement::new("target").with_text(target));
        if let Some(origin) = origin {
            alt.set_attribute("origin", origin);
        }
        self.element.append_element(alt);
    }

    /// Note texts of one origin (or all), without repeats.
    pub(crate) fn note_list(&self, origin: Option<NoteOrigin>) -> Vec<String> {
        let mut notes: Vec<String> = Vec::new();
        for note in self.element.children_named("note") {
            if origin.map_or(true, |o| note_origin(note.attribute("from")) == o) {
                let text = note.text();
                if !notes.contains(&text) {
                    notes.push(text);
                }
            }
        }
        notes
    }

    /// Locations recorded in `po-reference` context groups, `file:line`.
    pub(crate) fn references(&self) -> Vec<String> {
        self.context_groups("po-reference")
            .into_iter()
            .filter_map(|group| {
                let mut file = None;
                let mut line = None;
                for (kind, text) in group {
                    match kind.as_str() {
                        "sourcefile" => file = Some(text),
                        "linenumber" => line = Some(text),
                        _ => {}
                    }
                }
                match (file?, line) {
                    (file, Some(line)) if !line.is_empty() => Some(format!("{}:{}", file, line)),
                    (file, _) => Some(file),
                }
            })
            .collect()
    }
}

impl TranslationUnit for XliffUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.element.child("source").map(XmlElement::text).unwrap_or_default())
    }

    fn set_source(&mut self, source: Multistring) {
        self.element.ensure_child("source", &[]).set_text(source.as_str());
    }

    fn target(&self) -> Option<Multistring> {
        self.target_element().map(|target| Multistring::from(target.text()))
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        match target {
            Some(text) => {
                self.element
                    .ensure_child("target", &["source", "seg-source"])
                    .set_text(text.as_str());
                if !text.is_empty() {
                    self.mark_translated();
                }
            }
            None => self.element.remove_children("target"),
        }
    }

    fn id(&self) -> String {
        self.element.attribute("id").unwrap_or_default().to_string()
    }

    fn set_id(&mut self, id: &str) {
        self.element.set_attribute("id", id);
    }

    fn locations(&self) -> Vec<String> {
        self.references()
    }

    fn add_location(&mut self, location: &str) {
        let (file, line) = location.rsplit_once(':').unwrap_or((location, ""));
        let mut contexts = vec![("sourcefile", file)];
        if !line.is_empty() {
            contexts.push(("linenumber", line));
        }
        self.add_context_group("po-reference", Some("location"), &contexts);
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        self.note_list(origin).join("\n")
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        self.element.append_element(
            XmlElement::new("note")
                .with_attribute("from", origin.as_str())
                .with_text(text.trim()),
        );
    }

    /// Removes translator notes; developer notes belong to the source document.
    fn remove_notes(&mut self) {
        let kept: Vec<XmlNode> = std::mem::take(&mut self.element.children)
            .into_iter()
            .filter(|node| {
                !matches!(node, XmlNode::Element(e)
                    if e.local_name() == "note" && note_origin(e.attribute("from")) == NoteOrigin::Translator)
            })
            .collect();
        self.element.children = kept;
    }

    fn is_fuzzy(&self) -> bool {
        self.target_element().is_some() && self.element.attribute("approved") == Some("no")
    }

    fn mark_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            self.element.set_attribute("approved", "no");
            self.set_target_state(Some("needs-review-translation"));
        } else {
            if self.element.attribute("approved") == Some("no") {
                self.element.set_attribute("approved", "yes");
            }
            if self.target_state().map_or(false, |s| s.starts_with("needs-review")) {
                self.set_target_state(None);
            }
        }
    }

    fn is_review(&self) -> bool {
        self.target_state().map_or(false, |state| state.contains("needs-review"))
    }

    fn mark_review_needed(&mut self, needed: bool, explanation: Option<&str>) {
        if self.target_element().is_none() {
            return;
        }
        if needed {
            self.set_target_state(Some("needs-review-translation"));
            if let Some(explanation) = explanation {
                self.add_note(explanation, NoteOrigin::Translator);
            }
        } else {
            self.set_target_state(None);
        }
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

    fn is_translatable(&self) -> bool {
        !self
            .element
            .attribute("translate")
            .map_or(false, |value| value.eq_ignore_ascii_case("no"))
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }

}

/// Document skeleton shared by the XLIFF stores: the tree with unit slots and
/// the body new units go to.
#[derive(Debug, Clone)]
pub(crate) struct XliffDocument {
    pub document: XmlDocument,
    body: Option<Vec<usize>>,
    active_file: String,
    message_count: usize,
    datatype: &'static str,
}

impl XliffDocument {
    pub fn new(datatype: &'static str, source_language: &str) -> Self {
        let body = XmlElement {
            children: vec![XmlNode::Text("\n    ".to_string())],
            ..XmlElement::new("body")
        };
        let file = XmlElement::new("file")
            .with_attribute("original", DEFAULT_FILE)
            .with_attribute("source-language", source_language)
            .with_attribute("datatype", datatype);
        let file = XmlElement {
            children: vec![
                XmlNode::Text("\n    ".to_string()),
                XmlNode::Element(body),
                XmlNode::Text("\n  ".to_string()),
            ],
            ..file
        };
        let root = XmlElement {
            name: "xliff".to_string(),
            attributes: vec![
                ("version".to_string(), "1.1".to_string()),
                ("xmlns".to_string(), XLIFF_NAMESPACE.to_string()),
            ],
            children: vec![
                XmlNode::Text("\n  ".to_string()),
                XmlNode::Element(file),
                XmlNode::Text("\n".to_string()),
            ],
        };
        Self {
            document: XmlDocument::new(root),
            body: Some(vec![1, 1]),
            active_file: DEFAULT_FILE.to_string(),
            message_count: 0,
            datatype,
        }
    }

    /// Parse and detach the elements matching `is_unit`.
    pub fn parse(
        raw: &str,
        format: FileFormat,
        datatype: &'static str,
        is_unit: &dyn Fn(&XmlElement) -> bool,
    ) -> Result<(Self, Vec<XmlElement>), StoreError> {
        let mut document = XmlDocument::parse(raw, format)?;
        if document.root.local_name() != "xliff" {
            return Err(StoreError::parse(
                format,
                1,
                format!("root element is <{}>, expected <xliff>", document.root.name),
            ));
        }
        let units = document.root.detach(is_unit);
        let mut parsed = Self {
            document,
            body: None,
            active_file: String::new(),
            message_count: 0,
            datatype,
        };
        parsed.activate_last_file();
        parsed.message_count = units.len();
        Ok((parsed, units))
    }

    fn activate_last_file(&mut self) {
        let root = &self.document.root;
        self.body = root.find_last_path(&|e| e.local_name() == "body");
        self.active_file = root
            .find_last_path(&|e| e.local_name() == "file")
            .and_then(|path| self.file_at(&path))
            .unwrap_or_default();
    }

    fn file_at(&self, path: &[usize]) -> Option<String> {
        let mut element = &self.document.root;
        for index in path {
            element = match element.children.get(*index)? {
                XmlNode::Element(child) => child,
                _ => return None,
            };
        }
        element.attribute("original").map(str::to_string)
    }

    /// Languages declared on the first `<file>`.
    pub fn languages(&self) -> (Option<String>, Option<String>) {
        let file = self.document.root.child("file");
        let language = |name: &str| {
            file.and_then(|f| f.attribute(name))
                .filter(|l| !l.is_empty())
                .map(str::to_string)
        };
        (language("source-language"), language("target-language"))
    }

    pub fn file_names(&self) -> Vec<String> {
        self.document
            .root
            .children_named("file")
            .filter_map(|file| file.attribute("original"))
            .map(str::to_string)
            .collect()
    }

    pub fn active_file(&self) -> &str {
        &self.active_file
    }

    /// Make the named `<file>` receive new units, creating it when asked.
    pub fn switch_file(&mut self, name: &str, create: bool) -> bool {
        let position = self
            .document
            .root
            .children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(e) if e.local_name() == "file" && e.attribute("original") == Some(name)));
        let position = match position {
            Some(position) => position,
            None if create => {
                let source_language = self.languages().0.unwrap_or_else(|| "en".to_string());
                let file = XmlElement::new("file")
                    .with_attribute("original", name)
                    .with_attribute("source-language", source_language)
                    .with_attribute("datatype", self.datatype)
                    .with_child(XmlElement::new("body"));
                self.document.root.append_element(file);
                match self
                    .document
                    .root
                    .children
                    .iter()
                    .rposition(|node| matches!(node, XmlNode::Element(_)))
                {
                    Some(position) => position,
                    None => return false,
                }
            }
            None => return false,
        };

        let Some(XmlNode::Element(file)) = self.document.root.children.get_mut(position) else {
            return false;
        };
        let has_body = file.elements().any(|e| e.local_name() == "body");
        let body = if has_body {
            file.find_path(&|e| e.local_name() == "body")
        } else {
            file.append_element(XmlElement::new("body"));
            file.find_last_path(&|e| e.local_name() == "body")
        };
        self.body = body.map(|mut path| {
            path.insert(0, position);
            path
        });
        self.active_file = name.to_string();
        self.message_count = self
            .body
            .clone()
            .and_then(|path| self.document.root.at_path_mut(&path).map(|body| count_slots(body)))
            .unwrap_or_default();
        true
    }

    /// Next running message id in the active file.
    pub fn next_id(&mut self) -> String {
        self.message_count += 1;
        self.message_count.to_string()
    }

    /// Place slot `index` at the end of the active body.
    pub fn attach(&mut self, index: usize) {
        if self.body.is_none() {
            let name = if self.active_file.is_empty() {
                DEFAULT_FILE.to_string()
            } else {
                self.active_file.clone()
            };
            self.switch_file(&name, true);
        }
        if let Some(body) = self.body.clone().and_then(|path| self.document.root.at_path_mut(&path)) {
            body.append(XmlNode::Slot(index));
        }
    }

    pub fn write(&self, metadata: &StoreMetadata, slots: &mut dyn FnMut(usize, &mut String)) -> String {
        let mut document = self.document.clone();
        for file in document.root.elements_mut().filter(|e| e.local_name() == "file") {
            if let Some(language) = &metadata.source_language {
                file.set_attribute("source-language", language.as_str());
            }
            if let Some(language) = &metadata.target_language {
                file.set_attribute("target-language", language.as_str());
            }
        }
        document.write_with(slots)
    }
}

fn count_slots(element: &XmlElement) -> usize {
    element
        .children
        .iter()
        .map(|node| match node {
            XmlNode::Slot(_) => 1,
            XmlNode::Element(child) => count_slots(child),
            _ => 0,
        })
        .sum()
}

#[derive(Debug)]
pub struct XliffStore {
    core: StoreCore<XliffUnit>,
    document: XliffDocument,
}

impl Default for XliffStore {
    fn default() -> Self {
        Self {
            core: StoreCore::new(),
            document: XliffDocument::new("plaintext", "en"),
        }
    }
}

impl XliffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[XliffUnit] {
        &self.core.units
    }

    pub fn file_names(&self) -> Vec<String> {
        self.document.file_names()
    }

    pub fn active_file(&self) -> &str {
        self.document.active_file()
    }

    /// Send new units to the named `<file>`; see [`XliffDocument::switch_file`].
    pub fn switch_file(&mut self, name: &str, create: bool) -> bool {
        self.document.switch_file(name, create)
    }
}

impl TranslationStore for XliffStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Xliff
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let mut unit = XliffUnit::new(source.as_str());
        unit.set_id(&self.document.next_id());
        let index = self.core.push(unit);
        self.document.attach(index);
        index
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let (document, elements) = XliffDocument::parse(raw, FileFormat::Xliff, "plaintext", &|e| {
            e.local_name() == "trans-unit"
        })?;
        self.core.clear();
        let (source_language, target_language) = document.languages();
        self.core.metadata.source_language = source_language;
        self.core.metadata.target_language = target_language;
        self.core.metadata.apply_options(options);
        self.document = document;
        for element in elements {
            self.core.push(XliffUnit::from_element(element));
        }
        Ok(self.core.check_duplicates(FileFormat::Xliff))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let units = &self.core.units;
        Ok(self.document.write(&self.core.metadata, &mut |index, out| {
            if let Some(unit) = units.get(index) {
                unit.element.write(out, &mut |_, _| {});
            }
        }))
    }
}
