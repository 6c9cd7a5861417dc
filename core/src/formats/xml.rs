/// Minimal XML tree shared by the XML-based codecs
///
/// The tree keeps comments, processing instructions and whitespace so that
/// documents round-trip with their layout. Codecs detach their unit elements
/// into [`XmlNode::Slot`] placeholders and write them back in place on
/// serialization.
use crate::error::{line_of, StoreError};
use crate::formats::FileFormat;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    /// Comments, processing instructions, declarations and doctypes, verbatim.
    Markup(String),
    /// Where detached element `n` is written back.
    Slot(usize),
}

impl XmlNode {
    fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn is_element_like(&self) -> bool {
        matches!(self, Self::Element(_) | Self::Slot(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Qualified name as written, prefix included.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute by qualified name (`xml:lang`, `approved`).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.local_name() == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.local_name() == name)
    }

    /// Concatenated character data of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
                _ => {}
            }
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Append a child, copying the indentation used before the previous one
    /// (or the closing whitespace when there is no previous child).
    pub fn append(&mut self, node: XmlNode) {
        let indent = self.sibling_indent().or_else(|| match self.children.last() {
            Some(XmlNode::Text(text)) if text.trim().is_empty() => Some(format!("{}  ", text)),
            _ => None,
        });
        let at = match self.children.last() {
            Some(last) if last.is_whitespace() => self.children.len() - 1,
            _ => self.children.len(),
        };
        match indent {
            Some(indent) => {
                self.children.insert(at, XmlNode::Text(indent));
                self.children.insert(at + 1, node);
            }
            None => self.children.insert(at, node),
        }
    }

    pub fn append_element(&mut self, element: XmlElement) -> &mut XmlElement {
        self.append(XmlNode::Element(element));
        let position = self
            .children
            .iter()
            .rposition(|node| matches!(node, XmlNode::Element(_)))
            .unwrap_or_default();
        match &mut self.children[position] {
            XmlNode::Element(element) => element,
            _ => unreachable!("appended node is an element"),
        }
    }

    /// Insert `element` before the first child element, with the same indentation.
    pub fn prepend_element(&mut self, element: XmlElement) -> &mut XmlElement {
        let Some(first) = self.children.iter().position(XmlNode::is_element_like) else {
            return self.append_element(element);
        };
        let indent = match first.checked_sub(1).map(|i| &self.children[i]) {
            Some(XmlNode::Text(text)) if text.trim().is_empty() => Some(text.clone()),
            _ => None,
        };
        self.children.insert(first, XmlNode::Element(element));
        if let Some(indent) = indent {
            self.children.insert(first + 1, XmlNode::Text(indent));
        }
        match &mut self.children[first] {
            XmlNode::Element(element) => element,
            _ => unreachable!("inserted node is an element"),
        }
    }

    /// Insert `element` after the last child named in `after`, or append it.
    pub fn insert_after(&mut self, after: &[&str], element: XmlElement) -> &mut XmlElement {
        let anchor = self.children.iter().rposition(|node| {
            matches!(node, XmlNode::Element(e) if after.contains(&e.local_name()))
        });
        let Some(anchor) = anchor else {
            return self.append_element(element);
        };
        let indent = match anchor.checked_sub(1).map(|i| &self.children[i]) {
            Some(XmlNode::Text(text)) if text.trim().is_empty() => Some(text.clone()),
            _ => None,
        };
        let mut position = anchor + 1;
        if let Some(indent) = indent {
            self.children.insert(position, XmlNode::Text(indent));
            position += 1;
        }
        self.children.insert(position, XmlNode::Element(element));
        match &mut self.children[position] {
            XmlNode::Element(element) => element,
            _ => unreachable!("inserted node is an element"),
        }
    }

    /// Get the named child, creating it with [`XmlElement::insert_after`] if missing.
    pub fn ensure_child(&mut self, name: &str, after: &[&str]) -> &mut XmlElement {
        let found = self.elements().position(|e| e.local_name() == name);
        match found {
            Some(index) => match self.elements_mut().nth(index) {
                Some(element) => element,
                None => unreachable!("child index is in range"),
            },
            None => self.insert_after(after, XmlElement::new(name)),
        }
    }

    /// Remove every child element with this local name and the whitespace before it.
    pub fn remove_children(&mut self, name: &str) {
        let mut kept: Vec<XmlNode> = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            if matches!(&node, XmlNode::Element(e) if e.local_name() == name) {
                if kept.last().map_or(false, XmlNode::is_whitespace) {
                    kept.pop();
                }
                continue;
            }
            kept.push(node);
        }
        self.children = kept;
    }

    fn sibling_indent(&self) -> Option<String> {
        let last = self.children.iter().rposition(XmlNode::is_element_like)?;
        match last.checked_sub(1).map(|i| &self.children[i]) {
            Some(XmlNode::Text(text)) if text.trim().is_empty() => Some(text.clone()),
            _ => None,
        }
    }

    /// Child-index path to the first descendant (or self) matching `pred`.
    pub fn find_path(&self, pred: &dyn Fn(&XmlElement) -> bool) -> Option<Vec<usize>> {
        if pred(self) {
            return Some(Vec::new());
        }
        for (index, node) in self.children.iter().enumerate() {
            if let XmlNode::Element(element) = node {
                if let Some(mut path) = element.find_path(pred) {
                    path.insert(0, index);
                    return Some(path);
                }
            }
        }
        None
    }

    /// Like [`XmlElement::find_path`] but for the last match in document order.
    pub fn find_last_path(&self, pred: &dyn Fn(&XmlElement) -> bool) -> Option<Vec<usize>> {
        for (index, node) in self.children.iter().enumerate().rev() {
            if let XmlNode::Element(element) = node {
                if let Some(mut path) = element.find_last_path(pred) {
                    path.insert(0, index);
                    return Some(path);
                }
            }
        }
        pred(self).then(Vec::new)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self.children.get_mut(*first)? {
            XmlNode::Element(element) => element.at_path_mut(rest),
            _ => None,
        }
    }

    /// Replace every element matching `is_unit` with a slot, in document
    /// order, and return the detached elements. Matches are not descended.
    pub fn detach(&mut self, is_unit: &dyn Fn(&XmlElement) -> bool) -> Vec<XmlElement> {
        let mut detached = Vec::new();
        self.detach_into(is_unit, &mut detached);
        detached
    }

    fn detach_into(&mut self, is_unit: &dyn Fn(&XmlElement) -> bool, detached: &mut Vec<XmlElement>) {
        for node in &mut self.children {
            let XmlNode::Element(element) = node else { continue };
            if is_unit(element) {
                let slot = XmlNode::Slot(detached.len());
                if let XmlNode::Element(element) = std::mem::replace(node, slot) {
                    detached.push(element);
                }
            } else {
                element.detach_into(is_unit, detached);
            }
        }
    }

    pub fn write(&self, out: &mut String, slots: &mut dyn FnMut(usize, &mut String)) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", key, escape_controls(&escape(value))));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            write_node(node, out, slots);
        }
        out.push_str(&format!("</{}>", self.name));
    }

    /// Serialize this element alone; slots are dropped.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, &mut |_, _| {});
        out
    }
}

fn write_node(node: &XmlNode, out: &mut String, slots: &mut dyn FnMut(usize, &mut String)) {
    match node {
        XmlNode::Element(element) => element.write(out, slots),
        XmlNode::Text(text) => out.push_str(&escape_controls(&partial_escape(text))),
        XmlNode::CData(text) => out.push_str(&format!("<![CDATA[{}]]>", text)),
        XmlNode::Markup(raw) => out.push_str(raw),
        XmlNode::Slot(index) => slots(*index, out),
    }
}

/// Control characters (a PO context separator in an id, say) as character references.
fn escape_controls(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => c.to_string(),
            c if c.is_control() && u32::from(c) < 0x20 => format!("&#x{:X};", u32::from(c)),
            c => c.to_string(),
        })
        .collect()
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: Vec<XmlNode>,
    pub root: XmlElement,
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// A new document with an XML declaration.
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: vec![
                XmlNode::Markup(r#"<?xml version="1.0" encoding="utf-8"?>"#.to_string()),
                XmlNode::Text("\n".to_string()),
            ],
            root,
            epilog: vec![XmlNode::Text("\n".to_string())],
        }
    }

    pub fn parse(raw: &str, format: FileFormat) -> Result<Self, StoreError> {
        let error = |offset: usize, message: String| StoreError::parse(format, line_of(raw, offset), message);

        let mut reader = Reader::from_str(raw);
        reader.trim_text(false);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let start = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| error(reader.buffer_position(), e.to_string()))?;
            let end = reader.buffer_position();

            let node = match event {
                Event::Eof => break,
                Event::Start(tag) => {
                    stack.push(element_from(&tag).map_err(|message| error(start, message))?);
                    continue;
                }
                Event::End(_) => match stack.pop() {
                    Some(element) => XmlNode::Element(element),
                    None => return Err(error(start, "unexpected closing tag".to_string())),
                },
                Event::Empty(tag) => {
                    XmlNode::Element(element_from(&tag).map_err(|message| error(start, message))?)
                }
                Event::Text(text) => XmlNode::Text(
                    text.unescape()
                        .map_err(|e| error(start, e.to_string()))?
                        .into_owned(),
                ),
                Event::CData(data) => XmlNode::CData(
                    String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| error(start, e.to_string()))?,
                ),
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                    XmlNode::Markup(raw[start..end].to_string())
                }
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }
            match node {
                XmlNode::Element(element) if root.is_none() => root = Some(element),
                XmlNode::Element(_) => return Err(error(start, "more than one root element".to_string())),
                XmlNode::Text(text) if !text.trim().is_empty() => {
                    return Err(error(start, "text outside the root element".to_string()))
                }
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if !stack.is_empty() {
            return Err(error(raw.len(), "unclosed element".to_string()));
        }
        let root = root.ok_or_else(|| error(raw.len(), "no root element".to_string()))?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    pub fn write_with(&self, slots: &mut dyn FnMut(usize, &mut String)) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            write_node(node, &mut out, slots);
        }
        self.root.write(&mut out, slots);
        for node in &self.epilog {
            write_node(node, &mut out, slots);
        }
        out
    }

    pub fn to_xml(&self) -> String {
        self.write_with(&mut |_, _| {})
    }
}

fn element_from(tag: &BytesStart) -> Result<XmlElement, String> {
    let name = std::str::from_utf8(tag.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();
    let mut element = XmlElement::new(name);
    for attribute in tag.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<?xml version=\"1.0\"?>\n<!-- head -->\n<root a=\"1 &amp; 2\">\n  <item id=\"x\">One &lt;b&gt;</item>\n  <item id=\"y\"><![CDATA[<raw>]]></item>\n  <empty/>\n</root>\n";

    #[test]
    fn round_trips_layout() {
        let doc = XmlDocument::parse(DOC, FileFormat::Xliff).unwrap();
        assert_eq!(doc.root.attribute("a"), Some("1 & 2"));
        assert_eq!(doc.to_xml(), DOC);
    }

    #[test]
    fn text_and_children() {
        let doc = XmlDocument::parse(DOC, FileFormat::Xliff).unwrap();
        let items: Vec<String> = doc.root.children_named("item").map(XmlElement::text).collect();
        assert_eq!(items, vec!["One <b>", "<raw>"]);
        assert!(doc.root.child("empty").unwrap().children.is_empty());
    }

    #[test]
    fn ensure_child_reuses_or_creates() {
        let mut doc = XmlDocument::parse(DOC, FileFormat::Xliff).unwrap();
        doc.root.ensure_child("empty", &[]).set_text("filled");
        assert_eq!(doc.root.children_named("empty").count(), 1);
        assert_eq!(doc.root.child("empty").unwrap().text(), "filled");

        doc.root.ensure_child("note", &["item"]).set_text("added");
        let names: Vec<&str> = doc.root.elements().map(XmlElement::local_name).collect();
        assert_eq!(names, vec!["item", "item", "note", "empty"]);
        doc.root.ensure_child("note", &["item"]).set_text("again");
        assert_eq!(doc.root.children_named("note").count(), 1);
        assert_eq!(doc.root.child("note").unwrap().text(), "again");
    }

    #[test]
    fn detached_elements_are_written_back_in_place() {
        let mut doc = XmlDocument::parse(DOC, FileFormat::Xliff).unwrap();
        let mut units = doc.root.detach(&|e| e.local_name() == "item");
        assert_eq!(units.len(), 2);
        units[1].set_attribute("id", "z");
        let out = doc.write_with(&mut |i, out| units[i].write(out, &mut |_, _| {}));
        assert!(out.contains("<item id=\"z\">"));
        assert!(out.contains("<item id=\"x\">One &lt;b&gt;</item>"));
    }

    #[test]
    fn append_copies_sibling_indentation() {
        let mut doc = XmlDocument::parse(DOC, FileFormat::Xliff).unwrap();
        doc.root.append_element(XmlElement::new("item").with_text("Two"));
        assert!(doc.to_xml().ends_with("  <empty/>\n  <item>Two</item>\n</root>\n"));
    }

    #[test]
    fn insert_after_places_child_behind_anchor() {
        let mut element = XmlDocument::parse("<u>\n  <source>a</source>\n  <note>n</note>\n</u>", FileFormat::Xliff)
            .unwrap()
            .root;
        element.insert_after(&["source"], XmlElement::new("target").with_text("b"));
        assert_eq!(
            element.to_xml(),
            "<u>\n  <source>a</source>\n  <target>b</target>\n  <note>n</note>\n</u>"
        );
        element.remove_children("note");
        assert_eq!(element.to_xml(), "<u>\n  <source>a</source>\n  <target>b</target>\n</u>");
    }

    #[test]
    fn control_characters_survive_as_references() {
        let element = XmlElement::new("u").with_attribute("id", "ctx\u{4}Open");
        assert_eq!(element.to_xml(), "<u id=\"ctx&#x4;Open\"/>");
        let again = XmlDocument::parse(&element.to_xml(), FileFormat::Xliff).unwrap();
        assert_eq!(again.root.attribute("id"), Some("ctx\u{4}Open"));
    }

    #[test]
    fn first_child_is_indented_from_closing_whitespace() {
        let mut doc = XmlDocument::parse("<body>\n</body>", FileFormat::Xliff).unwrap();
        doc.root.append(XmlNode::Slot(0));
        doc.root.append(XmlNode::Slot(1));
        let out = doc.write_with(&mut |i, out| out.push_str(&format!("<u{}/>", i)));
        assert_eq!(out, "<body>\n  <u0/>\n  <u1/>\n</body>");
    }

    #[test]
    fn malformed_input_reports_a_line() {
        let err = XmlDocument::parse("<a>\n<b>\n</a>", FileFormat::Ts).unwrap_err();
        assert!(matches!(err, StoreError::Parse { format: FileFormat::Ts, .. }));
        assert!(XmlDocument::parse("   ", FileFormat::Ts).is_err());
    }

    #[test]
    fn paths_find_nested_elements() {
        let doc = XmlDocument::parse("<x><f/><f><body/></f></x>", FileFormat::Xliff).unwrap();
        let mut root = doc.root;
        let path = root.find_last_path(&|e| e.local_name() == "body").unwrap();
        assert_eq!(path, vec![1, 0]);
        assert!(root.at_path_mut(&path).is_some());
    }
}
