/// Qt phrase book (`.qph`) codec
///
/// A flat list of `<phrase>` elements with source, target and an optional
/// definition, which is the only note a phrase carries.
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};

#[derive(Debug, Clone, PartialEq)]
pub struct QphUnit {
    element: XmlElement,
    obsolete: bool,
    errors: UnitErrors,
}

impl QphUnit {
    pub fn new(source: &str) -> Self {
        let indent = || XmlNode::Text("\n    ".to_string());
        let element = XmlElement {
            children: vec![
                indent(),
                XmlNode::Element(XmlElement::new("source").with_text(source)),
                indent(),
                XmlNode::Element(XmlElement::new("target")),
                XmlNode::Text("\n".to_string()),
            ],
            ..XmlElement::new("phrase")
        };
        Self::from_element(element)
    }

    fn from_element(element: XmlElement) -> Self {
        Self {
            element,
            obsolete: false,
            errors: UnitErrors::new(),
        }
    }

    pub fn definition(&self) -> String {
        self.element.child("definition").map(XmlElement::text).unwrap_or_default()
    }
}

impl TranslationUnit for QphUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.element.child("source").map(XmlElement::text).unwrap_or_default())
    }

    fn set_source(&mut self, source: Multistring) {
        self.element.ensure_child("source", &[]).set_text(source.as_str());
    }

    fn target(&self) -> Option<Multistring> {
        self.element.child("target").map(|target| Multistring::from(target.text()))
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        match target {
            Some(target) => self.element.ensure_child("target", &["source"]).set_text(target.as_str()),
            None => self.element.remove_children("target"),
        }
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        match origin {
            None | Some(NoteOrigin::Developer) => self.definition(),
            Some(_) => String::new(),
        }
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        let current = self.definition();
        let joined = [current.as_str(), text.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.element
            .ensure_child("definition", &["source", "target"])
            .set_text(joined);
    }

    fn remove_notes(&mut self) {
        self.element.remove_children("definition");
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
pub struct QphStore {
    core: StoreCore<QphUnit>,
    document: XmlDocument,
}

impl Default for QphStore {
    fn default() -> Self {
        let root = XmlElement {
            children: vec![XmlNode::Text("\n".to_string())],
            ..XmlElement::new("QPH")
        };
        let mut document = XmlDocument::new(root);
        document.prolog.push(XmlNode::Markup("<!DOCTYPE QPH>".to_string()));
        document.prolog.push(XmlNode::Text("\n".to_string()));
        Self {
            core: StoreCore::new(),
            document,
        }
    }
}

impl QphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[QphUnit] {
        &self.core.units
    }
}

impl TranslationStore for QphStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Qph
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let index = self.core.push(QphUnit::new(source.as_str()));
        self.document.root.append(XmlNode::Slot(index));
        index
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let mut document = XmlDocument::parse(raw, FileFormat::Qph)?;
        if document.root.local_name() != "QPH" {
            return Err(StoreError::parse(
                FileFormat::Qph,
                1,
                format!("root element is <{}>, expected <QPH>", document.root.name),
            ));
        }
        let phrases = document.root.detach(&|e| e.local_name() == "phrase");

        self.core.clear();
        let language = |name: &str| document.root.attribute(name).filter(|v| !v.is_empty()).map(str::to_string);
        self.core.metadata.source_language = language("sourcelanguage");
        self.core.metadata.target_language = language("language");
        self.core.metadata.apply_options(options);
        self.document = document;
        for phrase in phrases {
            self.core.push(QphUnit::from_element(phrase));
        }
        Ok(self.core.check_duplicates(FileFormat::Qph))
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
