/// LISA family codecs: TMX translation memories and TBX termbases
///
/// Both formats hold one element per entry with a child per language,
/// tagged with `xml:lang`. The first language child is the source, the second
/// the target. The two differ only in element names, captured by [`LisaSchema`].
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, StoreMetadata, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};

/// Element names of one LISA format.
#[derive(Debug, PartialEq, Eq)]
pub struct LisaSchema {
    pub format: FileFormat,
    pub root: &'static str,
    pub unit: &'static str,
    pub language: &'static str,
    /// Elements between the language element and its text, outermost first.
    pub text_path: &'static [&'static str],
    pub id_attribute: &'static str,
}

pub static TMX: LisaSchema = LisaSchema {
    format: FileFormat::Tmx,
    root: "tmx",
    unit: "tu",
    language: "tuv",
    text_path: &["seg"],
    id_attribute: "tuid",
};

pub static TBX: LisaSchema = LisaSchema {
    format: FileFormat::Tbx,
    root: "martif",
    unit: "termEntry",
    language: "langSet",
    text_path: &["tig", "term"],
    id_attribute: "id",
};

const LANG: &str = "xml:lang";

fn language_of(node: &XmlElement) -> Option<&str> {
    node.attribute(LANG).or_else(|| node.attribute("lang"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LisaUnit {
    element: XmlElement,
    schema: &'static LisaSchema,
    source_language: String,
    target_language: String,
    obsolete: bool,
    errors: UnitErrors,
}

impl LisaUnit {
    pub fn new(schema: &'static LisaSchema, source: &str, source_language: &str, target_language: &str) -> Self {
        let mut unit = Self::from_element(
            schema,
            XmlElement::new(schema.unit),
            source_language,
            target_language,
        );
        unit.set_source(Multistring::from(source));
        unit
    }

    fn from_element(
        schema: &'static LisaSchema,
        element: XmlElement,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        Self {
            element,
            schema,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            obsolete: false,
            errors: UnitErrors::new(),
        }
    }

    fn language_node(&self, position: usize) -> Option<&XmlElement> {
        self.element.children_named(self.schema.language).nth(position)
    }

    fn language_node_mut(&mut self, position: usize) -> Option<&mut XmlElement> {
        let name = self.schema.language;
        self.element.elements_mut().filter(|e| e.local_name() == name).nth(position)
    }

    /// Text of the entry in `language`, if it has one.
    pub fn text_in(&self, language: &str) -> Option<String> {
        self.element
            .children_named(self.schema.language)
            .find(|node| language_of(node).map_or(false, |l| l.eq_ignore_ascii_case(language)))
            .map(|node| self.node_text(node))
    }

    /// Languages present, in document order.
    pub fn languages(&self) -> Vec<String> {
        self.element
            .children_named(self.schema.language)
            .filter_map(language_of)
            .map(str::to_string)
            .collect()
    }

    fn node_text(&self, node: &XmlElement) -> String {
        let leaf = self.schema.text_path.last().copied().unwrap_or_default();
        node.find_path(&|e| e.local_name() == leaf)
            .and_then(|path| descend(node, &path))
            .map(XmlElement::text)
            .unwrap_or_default()
    }

    fn language_element(&self, language: &str, text: &str) -> XmlElement {
        let mut inner: Option<XmlElement> = None;
        for name in self.schema.text_path.iter().rev() {
            let element = match inner.take() {
                Some(child) => XmlElement::new(*name).with_child(child),
                None => XmlElement::new(*name).with_text(text),
            };
            inner = Some(element);
        }
        let node = XmlElement::new(self.schema.language).with_attribute(LANG, language);
        match inner {
            Some(child) => node.with_child(child),
            None => node.with_text(text),
        }
    }

    fn set_node_text(schema: &LisaSchema, node: &mut XmlElement, text: &str) {
        let leaf = schema.text_path.last().copied().unwrap_or_default();
        let path = node.find_path(&|e| e.local_name() == leaf);
        match path.and_then(|path| node.at_path_mut(&path)) {
            Some(leaf) => leaf.set_text(text),
            None => {
                let mut current = node;
                for name in schema.text_path {
                    current = current.ensure_child(name, &[]);
                }
                current.set_text(text);
            }
        }
    }
}

fn descend<'a>(node: &'a XmlElement, path: &[usize]) -> Option<&'a XmlElement> {
    let Some((first, rest)) = path.split_first() else {
        return Some(node);
    };
    match node.children.get(*first)? {
        XmlNode::Element(child) => descend(child, rest),
        _ => None,
    }
}

impl TranslationUnit for LisaUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.language_node(0).map(|n| self.node_text(n)).unwrap_or_default())
    }

    fn set_source(&mut self, source: Multistring) {
        let schema = self.schema;
        match self.language_node_mut(0) {
            Some(node) => Self::set_node_text(schema, node, source.as_str()),
            None => {
                let node = self.language_element(&self.source_language, source.as_str());
                self.element.prepend_element(node);
            }
        }
    }

    fn target(&self) -> Option<Multistring> {
        self.language_node(1).map(|n| Multistring::from(self.node_text(n)))
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        let schema = self.schema;
        let Some(target) = target else {
            let mut seen = 0;
            let mut kept: Vec<XmlNode> = Vec::with_capacity(self.element.children.len());
            for node in self.element.children.drain(..) {
                if matches!(&node, XmlNode::Element(e) if e.local_name() == schema.language) {
                    seen += 1;
                    if seen > 1 {
                        if matches!(kept.last(), Some(XmlNode::Text(t)) if t.trim().is_empty()) {
                            kept.pop();
                        }
                        continue;
                    }
                }
                kept.push(node);
            }
            self.element.children = kept;
            return;
        };
        match self.language_node_mut(1) {
            Some(node) => Self::set_node_text(schema, node, target.as_str()),
            None => {
                if self.language_node(0).is_none() {
                    self.set_source(Multistring::default());
                }
                let node = self.language_element(&self.target_language, target.as_str());
                self.element.insert_after(&[schema.language], node);
            }
        }
    }

    fn id(&self) -> String {
        match self.element.attribute(self.schema.id_attribute) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.source().as_str().to_string(),
        }
    }

    fn set_id(&mut self, id: &str) {
        self.element.set_attribute(self.schema.id_attribute, id);
    }

    fn notes(&self, _origin: Option<NoteOrigin>) -> String {
        self.element
            .children_named("note")
            .map(XmlElement::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn add_note(&mut self, text: &str, _origin: NoteOrigin) {
        self.element.append_element(XmlElement::new("note").with_text(text.trim()));
    }

    fn remove_notes(&mut self) {
        self.element.remove_children("note");
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

fn indented(element: XmlElement, indent: &str, closing: &str) -> XmlElement {
    let mut children = Vec::new();
    for child in element.children {
        children.push(XmlNode::Text(indent.to_string()));
        children.push(child);
    }
    children.push(XmlNode::Text(closing.to_string()));
    XmlElement { children, ..element }
}

fn tmx_document() -> XmlDocument {
    let header = XmlElement::new("header")
        .with_attribute("creationtool", env!("CARGO_PKG_NAME"))
        .with_attribute("creationtoolversion", env!("CARGO_PKG_VERSION"))
        .with_attribute("segtype", "sentence")
        .with_attribute("o-tmf", "UTF-8")
        .with_attribute("adminlang", "en")
        .with_attribute("srclang", "en")
        .with_attribute("datatype", "PlainText");
    let body = indented(XmlElement::new("body"), "", "\n  ");
    let root = indented(
        XmlElement::new("tmx")
            .with_attribute("version", "1.4")
            .with_child(header)
            .with_child(body),
        "\n  ",
        "\n",
    );
    let mut document = XmlDocument::new(root);
    document
        .prolog
        .push(XmlNode::Markup(r#"<!DOCTYPE tmx SYSTEM "tmx14.dtd">"#.to_string()));
    document.prolog.push(XmlNode::Text("\n".to_string()));
    document
}

fn tbx_document() -> XmlDocument {
    let header = XmlElement::new("martifHeader").with_child(
        XmlElement::new("fileDesc").with_child(
            XmlElement::new("sourceDesc").with_child(XmlElement::new("p").with_text("Termbase")),
        ),
    );
    let body = indented(XmlElement::new("body"), "", "\n    ");
    let text = indented(XmlElement::new("text").with_child(body), "\n    ", "\n  ");
    let root = indented(
        XmlElement::new("martif")
            .with_attribute("type", "TBX")
            .with_attribute(LANG, "en")
            .with_child(header)
            .with_child(text),
        "\n  ",
        "\n",
    );
    let mut document = XmlDocument::new(root);
    document.prolog.push(XmlNode::Markup(
        r#"<!DOCTYPE martif PUBLIC "ISO 12200:1999A//DTD MARTIF core (DXFcdV04)//EN" "TBXcdv04.dtd">"#
            .to_string(),
    ));
    document.prolog.push(XmlNode::Text("\n".to_string()));
    document
}

#[derive(Debug)]
pub struct LisaStore {
    core: StoreCore<LisaUnit>,
    schema: &'static LisaSchema,
    document: XmlDocument,
}

impl LisaStore {
    pub fn tmx() -> Self {
        Self::with_schema(&TMX, tmx_document())
    }

    pub fn tbx() -> Self {
        Self::with_schema(&TBX, tbx_document())
    }

    fn with_schema(schema: &'static LisaSchema, document: XmlDocument) -> Self {
        Self {
            core: StoreCore::new(),
            schema,
            document,
        }
    }

    pub fn units(&self) -> &[LisaUnit] {
        &self.core.units
    }

    fn body_path(&self) -> Option<Vec<usize>> {
        self.document.root.find_last_path(&|e| e.local_name() == "body")
    }

    fn languages(&self) -> (String, String) {
        let metadata = &self.core.metadata;
        (
            metadata.source_language.clone().unwrap_or_else(|| "en".to_string()),
            metadata.target_language.clone().unwrap_or_default(),
        )
    }

    /// Declared source language: TMX `srclang`, TBX root `xml:lang`.
    fn declared_source_language(&self) -> Option<String> {
        let value = match self.schema.format {
            FileFormat::Tmx => self.document.root.child("header").and_then(|h| h.attribute("srclang")),
            _ => language_of(&self.document.root),
        };
        value
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("*all*"))
            .map(str::to_string)
    }

    fn write_unit(unit: &LisaUnit, metadata: &StoreMetadata, out: &mut String) {
        let Some(target_language) = metadata.target_language.as_deref() else {
            unit.element.write(out, &mut |_, _| {});
            return;
        };
        let needs_language = unit
            .element
            .children_named(unit.schema.language)
            .any(|node| language_of(node).map_or(true, str::is_empty));
        if !needs_language {
            unit.element.write(out, &mut |_, _| {});
            return;
        }
        let mut element = unit.element.clone();
        for node in element.elements_mut().filter(|e| e.local_name() == unit.schema.language) {
            if language_of(node).map_or(true, str::is_empty) {
                node.set_attribute(LANG, target_language);
            }
        }
        element.write(out, &mut |_, _| {});
    }
}

impl TranslationStore for LisaStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        self.schema.format
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let (source_language, target_language) = self.languages();
        let unit = LisaUnit::new(self.schema, source.as_str(), &source_language, &target_language);
        let index = self.core.push(unit);
        if let Some(body) = self.body_path().and_then(|path| self.document.root.at_path_mut(&path)) {
            body.append(XmlNode::Slot(index));
        }
        index
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let format = self.schema.format;
        let mut document = XmlDocument::parse(raw, format)?;
        if document.root.local_name() != self.schema.root {
            return Err(StoreError::parse(
                format,
                1,
                format!("root element is <{}>, expected <{}>", document.root.name, self.schema.root),
            ));
        }
        let unit_name = self.schema.unit;
        let elements = document.root.detach(&|e| e.local_name() == unit_name);

        self.core.clear();
        self.document = document;
        self.core.metadata.source_language = self.declared_source_language();
        self.core.metadata.target_language = None;
        self.core.metadata.apply_options(options);
        let (source_language, _) = self.languages();

        for element in elements {
            let mut unit = LisaUnit::from_element(self.schema, element, &source_language, "");
            if self.core.metadata.target_language.is_none() {
                self.core.metadata.target_language = unit
                    .languages()
                    .into_iter()
                    .find(|l| !l.eq_ignore_ascii_case(&source_language));
            }
            unit.target_language = self.core.metadata.target_language.clone().unwrap_or_default();
            self.core.push(unit);
        }
        Ok(self.core.check_duplicates(format))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut document = self.document.clone();
        if let Some(language) = &self.core.metadata.source_language {
            match self.schema.format {
                FileFormat::Tmx => {
                    if let Some(header) = document.root.child_mut("header") {
                        header.set_attribute("srclang", language.as_str());
                    }
                }
                _ => document.root.set_attribute(LANG, language.as_str()),
            }
        }
        let units = &self.core.units;
        let metadata = &self.core.metadata;
        Ok(document.write_with(&mut |index, out| {
            if let Some(unit) = units.get(index) {
                Self::write_unit(unit, metadata, out);
            }
        }))
    }
}
