/// XLIFF produced from gettext catalogs
///
/// Plural messages are `<group restype="x-gettext-plurals">` elements holding
/// one `<trans-unit>` per form; the group acts as a single unit. PO comments
/// live in `po-entry` context groups and the PO header is a trans-unit with a
/// `x-gettext-domain-header` restype.
use super::xliff::{XliffDocument, XliffUnit};
use super::xml::{XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{NoteOrigin, TranslationUnit, UnitErrors};
use once_cell::sync::Lazy;
use regex::Regex;

const PLURAL_RESTYPE: &str = "x-gettext-plurals";
const HEADER_RESTYPE: &str = "x-gettext-domain-header";

static POXLIFF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"datatype\s*=\s*["']po["']|x-gettext-domain-header|x-gettext-plurals"#)
        .expect("valid po-xliff sniff regex")
});

/// Whether XLIFF content was generated from a PO catalog.
pub fn looks_like_poxliff(raw: &str) -> bool {
    POXLIFF_RE.is_match(raw)
}

fn is_plural_group(element: &XmlElement) -> bool {
    element.local_name() == "group" && element.attribute("restype") == Some(PLURAL_RESTYPE)
}

fn comment_type(origin: NoteOrigin) -> Option<&'static str> {
    match origin {
        NoteOrigin::Translator => Some("x-po-trancomment"),
        NoteOrigin::Developer => Some("x-po-autocomment"),
        NoteOrigin::SourceCode => None,
    }
}

/// PO comments of `unit` merged with its `<note>` elements.
fn po_notes(unit: &XliffUnit, origin: Option<NoteOrigin>) -> Vec<String> {
    let mut notes: Vec<String> = Vec::new();
    let wanted: Vec<&str> = match origin {
        Some(origin) => comment_type(origin).into_iter().collect(),
        None => vec!["x-po-trancomment", "x-po-autocomment"],
    };
    for group in unit.context_groups("po-entry") {
        for (kind, text) in group {
            if wanted.contains(&kind.as_str()) && !notes.contains(&text) {
                notes.push(text);
            }
        }
    }
    for note in unit.note_list(origin) {
        if !notes.contains(&note) {
            notes.push(note);
        }
    }
    notes
}

fn po_add_note(unit: &mut XliffUnit, text: &str, origin: NoteOrigin) {
    match comment_type(origin) {
        Some(kind) => unit.add_context_group("po-entry", Some("information"), &[(kind, text.trim())]),
        None => unit.add_note(text, origin),
    }
}

fn po_remove_notes(unit: &mut XliffUnit) {
    unit.remove_notes();
    for node in unit.element.children.iter_mut() {
        if let XmlNode::Element(group) = node {
            if group.local_name() == "context-group" && group.attribute("name") == Some("po-entry") {
                group.children.retain(|child| {
                    !matches!(child, XmlNode::Element(c) if c.attribute("context-type") == Some("x-po-trancomment"))
                });
            }
        }
    }
    unit.element.children.retain(|node| {
        !matches!(node, XmlNode::Element(e)
            if e.local_name() == "context-group" && !e.elements().any(|_| true))
    });
}

/// A gettext plural: the group element with a slot per form.
#[derive(Debug, Clone, PartialEq)]
pub struct PluralGroup {
    head: XliffUnit,
    units: Vec<XliffUnit>,
}

impl PluralGroup {
    fn from_element(mut element: XmlElement) -> Self {
        let units = element
            .detach(&|e| e.local_name() == "trans-unit")
            .into_iter()
            .map(XliffUnit::from_element)
            .collect();
        Self {
            head: XliffUnit::from_element(element),
            units,
        }
    }

    fn new(id: &str) -> Self {
        let element = XmlElement::new("group")
            .with_attribute("id", id)
            .with_attribute("restype", PLURAL_RESTYPE);
        Self {
            head: XliffUnit::from_element(element),
            units: Vec::new(),
        }
    }

    pub fn forms(&self) -> &[XliffUnit] {
        &self.units
    }

    fn push_form(&mut self, source: &str) -> &mut XliffUnit {
        let index = self.units.len();
        let mut unit = XliffUnit::new(source);
        let id = self.head.id();
        if !id.is_empty() {
            unit.set_id(&format!("{}[{}]", id, index));
        }
        self.units.push(unit);
        self.head.element.append(XmlNode::Slot(index));
        &mut self.units[index]
    }

    fn truncate(&mut self, len: usize) {
        if self.units.len() <= len {
            return;
        }
        self.units.truncate(len);
        let mut kept: Vec<XmlNode> = Vec::with_capacity(self.head.element.children.len());
        for node in self.head.element.children.drain(..) {
            if matches!(node, XmlNode::Slot(index) if index >= len) {
                if matches!(kept.last(), Some(XmlNode::Text(text)) if text.trim().is_empty()) {
                    kept.pop();
                }
                continue;
            }
            kept.push(node);
        }
        self.head.element.children = kept;
    }

    fn write(&self, out: &mut String) {
        let units = &self.units;
        self.head.element.write(out, &mut |index, out| {
            if let Some(unit) = units.get(index) {
                unit.element.write(out, &mut |_, _| {});
            }
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoXliffUnit {
    Single(XliffUnit),
    Plural(PluralGroup),
}

impl PoXliffUnit {
    fn from_element(element: XmlElement) -> Self {
        if is_plural_group(&element) {
            Self::Plural(PluralGroup::from_element(element))
        } else {
            Self::Single(XliffUnit::from_element(element))
        }
    }

    /// The element carrying id, notes and locations.
    fn head(&self) -> &XliffUnit {
        match self {
            Self::Single(unit) => unit,
            Self::Plural(group) => &group.head,
        }
    }

    fn head_mut(&mut self) -> &mut XliffUnit {
        match self {
            Self::Single(unit) => unit,
            Self::Plural(group) => &mut group.head,
        }
    }

    /// A `Name: value` line of the header unit.
    pub fn header_field(&self, name: &str) -> Option<String> {
        if !self.is_header() {
            return None;
        }
        let text = self.target().unwrap_or_else(|| self.source());
        text.as_str().lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    fn write(&self, out: &mut String) {
        match self {
            Self::Single(unit) => unit.element.write(out, &mut |_, _| {}),
            Self::Plural(group) => group.write(out),
        }
    }
}

impl TranslationUnit for PoXliffUnit {
    fn source(&self) -> Multistring {
        match self {
            Self::Single(unit) => unit.source(),
            Self::Plural(group) => {
                Multistring::new(group.units.iter().map(|u| u.source().as_str().to_string()).collect())
            }
        }
    }

    fn set_source(&mut self, source: Multistring) {
        match self {
            Self::Single(unit) => unit.set_source(source),
            Self::Plural(group) => {
                let forms = source.into_strings();
                group.truncate(forms.len());
                for (index, form) in forms.iter().enumerate() {
                    match group.units.get_mut(index) {
                        Some(unit) => unit.set_source(Multistring::from(form.as_str())),
                        None => {
                            group.push_form(form);
                        }
                    }
                }
            }
        }
    }

    fn target(&self) -> Option<Multistring> {
        match self {
            Self::Single(unit) => unit.target(),
            Self::Plural(group) => {
                if group.units.iter().all(|u| u.target().is_none()) {
                    return None;
                }
                Some(Multistring::new(
                    group
                        .units
                        .iter()
                        .map(|u| u.target().map(|t| t.as_str().to_string()).unwrap_or_default())
                        .collect(),
                ))
            }
        }
    }

    /// Extra target forms duplicate the last source form; missing ones are padded empty.
    fn set_target(&mut self, target: Option<Multistring>) {
        match self {
            Self::Single(unit) => unit.set_target(target),
            Self::Plural(group) => {
                let Some(target) = target else {
                    for unit in &mut group.units {
                        unit.set_target(None);
                    }
                    return;
                };
                let last_source = group
                    .units
                    .last()
                    .map(|u| u.source().as_str().to_string())
                    .unwrap_or_default();
                while group.units.len() < target.len() {
                    group.push_form(&last_source);
                }
                for (index, unit) in group.units.iter_mut().enumerate() {
                    let text = target.get(index).unwrap_or_default();
                    unit.set_target(Some(Multistring::from(text)));
                }
            }
        }
    }

    fn has_plural(&self) -> bool {
        matches!(self, Self::Plural(_))
    }

    fn id(&self) -> String {
        self.head().id()
    }

    fn set_id(&mut self, id: &str) {
        self.head_mut().set_id(id);
        if let Self::Plural(group) = self {
            for (index, unit) in group.units.iter_mut().enumerate() {
                unit.set_id(&format!("{}[{}]", id, index));
            }
        }
    }

    fn child_ids(&self) -> Vec<String> {
        let mut ids = vec![self.id()];
        if let Self::Plural(group) = self {
            ids.extend(group.units.iter().map(|unit| unit.id()).filter(|id| !id.is_empty()));
        }
        ids
    }

    fn locations(&self) -> Vec<String> {
        self.head().references()
    }

    fn add_location(&mut self, location: &str) {
        self.head_mut().add_location(location);
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        po_notes(self.head(), origin).join("\n")
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        po_add_note(self.head_mut(), text, origin);
    }

    fn remove_notes(&mut self) {
        po_remove_notes(self.head_mut());
    }

    fn is_fuzzy(&self) -> bool {
        match self {
            Self::Single(unit) => unit.is_fuzzy(),
            Self::Plural(group) => group.units.first().map_or(false, XliffUnit::is_fuzzy),
        }
    }

    fn mark_fuzzy(&mut self, fuzzy: bool) {
        match self {
            Self::Single(unit) => unit.mark_fuzzy(fuzzy),
            Self::Plural(group) => {
                for unit in &mut group.units {
                    unit.mark_fuzzy(fuzzy);
                }
            }
        }
    }

    fn is_review(&self) -> bool {
        match self {
            Self::Single(unit) => unit.is_review(),
            Self::Plural(group) => group.units.iter().any(XliffUnit::is_review),
        }
    }

    fn mark_review_needed(&mut self, needed: bool, explanation: Option<&str>) {
        match self {
            Self::Single(unit) => unit.mark_review_needed(needed, explanation),
            Self::Plural(group) => {
                for unit in &mut group.units {
                    unit.mark_review_needed(needed, None);
                }
                if let (true, Some(explanation)) = (needed, explanation) {
                    po_add_note(&mut group.head, explanation, NoteOrigin::Translator);
                }
            }
        }
    }

    fn is_obsolete(&self) -> bool {
        self.head().is_obsolete()
    }

    fn make_obsolete(&mut self) {
        self.head_mut().make_obsolete();
    }

    fn resurrect(&mut self) {
        self.head_mut().resurrect();
    }

    fn is_header(&self) -> bool {
        self.head()
            .restype()
            .map_or(false, |restype| restype.contains("gettext-domain-header"))
    }

    fn is_translatable(&self) -> bool {
        self.head().is_translatable()
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.head_mut().add_error(name, message);
    }

    fn errors(&self) -> UnitErrors {
        self.head().errors()
    }
}

#[derive(Debug)]
pub struct PoXliffStore {
    core: StoreCore<PoXliffUnit>,
    document: XliffDocument,
}

impl Default for PoXliffStore {
    fn default() -> Self {
        Self {
            core: StoreCore::new(),
            document: XliffDocument::new("po", "en-US"),
        }
    }
}

impl PoXliffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[PoXliffUnit] {
        &self.core.units
    }

    pub fn header(&self) -> Option<&PoXliffUnit> {
        self.core.units.iter().find(|unit| unit.is_header())
    }

    pub fn switch_file(&mut self, name: &str, create: bool) -> bool {
        self.document.switch_file(name, create)
    }

    fn push(&mut self, unit: PoXliffUnit) -> usize {
        let index = self.core.push(unit);
        self.document.attach(index);
        index
    }

    /// Append a plural group. Source forms without a matching target form are
    /// kept as untranslatable placeholders.
    pub fn add_plural(&mut self, source: Multistring, target: Option<Multistring>) -> usize {
        let id = self.document.next_id();
        let mut group = PluralGroup::new(&id);
        let mut sources = source.into_strings();
        let targets = target.map(Multistring::into_strings).unwrap_or_default();
        if let Some(last) = sources.last().cloned() {
            while sources.len() < targets.len() {
                sources.push(last.clone());
            }
        }
        for (index, form) in sources.iter().enumerate() {
            let unit = group.push_form(form);
            match targets.get(index) {
                Some(text) => unit.set_target(Some(Multistring::from(text.as_str()))),
                None if !targets.is_empty() => unit.element.set_attribute("translate", "no"),
                None => {}
            }
        }
        self.push(PoXliffUnit::Plural(group))
    }

    /// Append the catalog header, carried as a fuzzy untranslated-source unit.
    pub fn add_header_unit(&mut self, header: &str) -> usize {
        let mut unit = XliffUnit::new(header);
        unit.set_id(&self.document.next_id());
        unit.set_target(Some(Multistring::from(header)));
        unit.element.set_attribute("restype", HEADER_RESTYPE);
        unit.element.set_attribute("approved", "no");
        self.push(PoXliffUnit::Single(unit))
    }
}

impl TranslationStore for PoXliffStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::PoXliff
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        if source.is_plural() {
            return self.add_plural(source, None);
        }
        let mut unit = XliffUnit::new(source.as_str());
        unit.set_id(&self.document.next_id());
        self.push(PoXliffUnit::Single(unit))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let (document, elements) = XliffDocument::parse(raw, FileFormat::PoXliff, "po", &|e| {
            e.local_name() == "trans-unit" || is_plural_group(e)
        })?;
        self.core.clear();
        let (source_language, target_language) = document.languages();
        self.core.metadata.source_language = source_language;
        self.core.metadata.target_language = target_language;
        self.core.metadata.apply_options(options);
        self.document = document;
        for element in elements {
            self.core.push(PoXliffUnit::from_element(element));
        }
        Ok(self.core.check_duplicates(FileFormat::PoXliff))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let units = &self.core.units;
        Ok(self.document.write(&self.core.metadata, &mut |index, out| {
            if let Some(unit) = units.get(index) {
                unit.write(out);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xliff version="1.1" xmlns="urn:oasis:names:tc:xliff:document:1.1">
  <file original="app.po" source-language="en-US" datatype="po">
    <body>
      <trans-unit id="1" restype="x-gettext-domain-header" approved="no" xml:space="preserve">
        <source>Project-Id-Version: app 1.0
Plural-Forms: nplurals=2; plural=(n != 1);
</source>
        <target>Project-Id-Version: app 1.0
Plural-Forms: nplurals=2; plural=(n != 1);
</target>
      </trans-unit>
      <trans-unit id="2" approved="yes">
        <source>Open</source>
        <target>Open maar</target>
        <context-group name="po-entry" purpose="information">
          <context context-type="x-po-trancomment">Checked</context>
          <context context-type="x-po-autocomment">Menu item</context>
        </context-group>
      </trans-unit>
      <group id="3" restype="x-gettext-plurals">
        <trans-unit id="3[0]">
          <source>%d file</source>
          <target>%d lêer</target>
        </trans-unit>
        <trans-unit id="3[1]">
          <source>%d files</source>
          <target>%d lêers</target>
        </trans-unit>
        <context-group name="po-reference" purpose="location">
          <context context-type="sourcefile">list.c</context>
          <context context-type="linenumber">40</context>
        </context-group>
      </group>
    </body>
  </file>
</xliff>
"#;

    fn parse(raw: &str) -> PoXliffStore {
        let mut store = PoXliffStore::new();
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    #[test]
    fn sniffs_po_flavour() {
        assert!(looks_like_poxliff(SAMPLE));
        assert!(!looks_like_poxliff(
            r#"<xliff><file datatype="plaintext"><body/></file></xliff>"#
        ));
    }

    #[test]
    fn groups_become_plural_units() {
        let store = parse(SAMPLE);
        assert_eq!(store.unit_count(), 3);
        let plural = &store.units()[2];
        assert!(plural.has_plural());
        assert_eq!(plural.source(), Multistring::plural(["%d file", "%d files"]));
        assert_eq!(plural.target(), Some(Multistring::plural(["%d lêer", "%d lêers"])));
        assert_eq!(plural.child_ids(), vec!["3", "3[0]", "3[1]"]);
        assert_eq!(plural.locations(), vec!["list.c:40"]);
    }

    #[test]
    fn header_and_comments() {
        let store = parse(SAMPLE);
        let header = store.header().unwrap();
        assert_eq!(
            header.header_field("plural-forms").as_deref(),
            Some("nplurals=2; plural=(n != 1);")
        );
        let unit = &store.units()[1];
        assert_eq!(unit.notes(Some(NoteOrigin::Translator)), "Checked");
        assert_eq!(unit.notes(Some(NoteOrigin::Developer)), "Menu item");
        assert_eq!(unit.notes(None), "Checked\nMenu item");
    }

    #[test]
    fn round_trip_is_identical() {
        assert_eq!(parse(SAMPLE).serialize().unwrap(), SAMPLE);
    }

    #[test]
    fn extra_target_forms_grow_the_group() {
        let mut store = parse(SAMPLE);
        let plural = store.unit_mut(2).unwrap();
        plural.set_target(Some(Multistring::plural(["a", "b", "c"])));
        assert_eq!(
            plural.source(),
            Multistring::plural(["%d file", "%d files", "%d files"])
        );
        assert_eq!(plural.child_ids().last().map(String::as_str), Some("3[2]"));
        let again = parse(&store.serialize().unwrap());
        assert_eq!(again.units()[2].target(), Some(Multistring::plural(["a", "b", "c"])));
    }

    #[test]
    fn fuzzy_fans_out_to_forms() {
        let mut store = parse(SAMPLE);
        let plural = store.unit_mut(2).unwrap();
        plural.mark_fuzzy(true);
        assert!(plural.is_fuzzy());
        assert!(!plural.is_translated());
        plural.set_id("7");
        assert_eq!(plural.child_ids(), vec!["7", "7[0]", "7[1]"]);
    }

    #[test]
    fn plurals_are_added_as_groups() {
        let mut store = PoXliffStore::new();
        store.add_header_unit("Project-Id-Version: demo\n");
        let index = store.add_plural(
            Multistring::plural(["%d cat", "%d cats"]),
            Some(Multistring::from("%d kat")),
        );
        let out = store.serialize().unwrap();
        assert!(out.contains(r#"restype="x-gettext-plurals""#));
        assert!(out.contains(r#"translate="no""#));
        let again = parse(&out);
        assert_eq!(again.unit_count(), 2);
        assert!(again.units()[0].is_header());
        assert_eq!(again.units()[index].child_ids(), vec!["2", "2[0]", "2[1]"]);
    }

    #[test]
    fn notes_are_written_as_po_comments() {
        let mut store = PoXliffStore::new();
        let index = store.add_source_unit("Save".into());
        let unit = store.unit_mut(index).unwrap();
        unit.add_note("Short", NoteOrigin::Translator);
        unit.add_note("Toolbar", NoteOrigin::Developer);
        let out = store.serialize().unwrap();
        assert!(out.contains("x-po-trancomment"));
        let mut again = parse(&out);
        assert_eq!(again.units()[0].notes(Some(NoteOrigin::Developer)), "Toolbar");
        let unit = again.unit_mut(0).unwrap();
        unit.remove_notes();
        assert_eq!(unit.notes(None), "Toolbar");
    }
}
