/// The unit contract: one translatable entry of a store.
///
/// Every codec exposes its entries through [`TranslationUnit`]. Operations a
/// format cannot express degrade to the closest plain behaviour instead of
/// failing: plural accessors collapse to the first variant, flags a format
/// cannot store are kept in memory only, and so on.
use crate::multistring::Multistring;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Who wrote a note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NoteOrigin {
    Translator,
    Developer,
    SourceCode,
}

impl NoteOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translator => "translator",
            Self::Developer => "developer",
            Self::SourceCode => "source code",
        }
    }
}

/// Diagnostic annotations attached by checkers. Not part of round-trip content.
pub type UnitErrors = BTreeMap<String, String>;

pub trait TranslationUnit: fmt::Debug {
    fn source(&self) -> Multistring;

    fn set_source(&mut self, source: Multistring);

    /// `None` means the unit carries no target at all.
    fn target(&self) -> Option<Multistring>;

    fn set_target(&mut self, target: Option<Multistring>);

    fn has_plural(&self) -> bool {
        false
    }

    /// Identity key used for lookup, merge and terminology.
    fn id(&self) -> String {
        self.source().as_str().to_string()
    }

    fn set_id(&mut self, _id: &str) {}

    /// Every id a merge may match this unit under. Plural groups add their children.
    fn child_ids(&self) -> Vec<String> {
        vec![self.id()]
    }

    fn context(&self) -> Option<String> {
        None
    }

    fn locations(&self) -> Vec<String> {
        Vec::new()
    }

    fn add_location(&mut self, _location: &str) {}

    fn add_locations(&mut self, locations: &[String]) {
        for location in locations {
            self.add_location(location);
        }
    }

    /// Notes joined by newlines, optionally restricted to one origin.
    fn notes(&self, _origin: Option<NoteOrigin>) -> String {
        String::new()
    }

    fn add_note(&mut self, _text: &str, _origin: NoteOrigin) {}

    fn remove_notes(&mut self) {}

    fn is_fuzzy(&self) -> bool {
        false
    }

    fn mark_fuzzy(&mut self, _fuzzy: bool) {}

    fn is_obsolete(&self) -> bool {
        false
    }

    fn make_obsolete(&mut self) {}

    fn resurrect(&mut self) {}

    fn is_review(&self) -> bool {
        false
    }

    fn mark_review_needed(&mut self, _needed: bool, _explanation: Option<&str>) {}

    fn is_header(&self) -> bool {
        false
    }

    fn is_translatable(&self) -> bool {
        true
    }

    fn is_blank(&self) -> bool {
        !self.is_header()
            && self.source().is_empty()
            && self.target().map_or(true, |t| t.is_empty())
    }

    fn is_translated(&self) -> bool {
        !self.is_fuzzy()
            && !self.is_obsolete()
            && self.target().map_or(false, |t| !t.is_empty())
    }

    fn add_error(&mut self, name: &str, message: &str);

    fn errors(&self) -> UnitErrors;

    /// Pulls target state from `other`; see [`merge_unit`].
    fn merge_from(&mut self, other: &dyn TranslationUnit, overwrite: bool, comments: bool) {
        merge_unit(self, other, overwrite, comments);
    }
}

/// Copies target, fuzzy state, locations and notes from `other` when this unit
/// has no translation yet, or unconditionally with `overwrite`.
///
/// An empty incoming target never replaces a translated one.
pub fn merge_unit<U: TranslationUnit + ?Sized>(
    unit: &mut U,
    other: &dyn TranslationUnit,
    overwrite: bool,
    comments: bool,
) {
    let local_empty = unit.target().map_or(true, |t| t.is_empty());
    if !(local_empty || overwrite) {
        return;
    }

    let incoming = other.target();
    let incoming_empty = incoming.as_ref().map_or(true, |t| t.is_empty());
    if incoming_empty && !local_empty {
        return;
    }

    unit.set_target(incoming);
    unit.mark_fuzzy(other.is_fuzzy());
    if other.is_obsolete() {
        unit.make_obsolete();
    }

    let known = unit.locations();
    let fresh: Vec<String> = other
        .locations()
        .into_iter()
        .filter(|location| !known.contains(location))
        .collect();
    unit.add_locations(&fresh);

    if comments {
        copy_notes(unit, other);
    }
}

/// Copies the state a foreign unit carries onto a freshly built native unit.
pub fn copy_unit<U: TranslationUnit + ?Sized>(unit: &mut U, other: &dyn TranslationUnit) {
    unit.set_target(other.target());
    unit.add_locations(&other.locations());
    copy_notes(unit, other);
    if other.is_fuzzy() {
        unit.mark_fuzzy(true);
    }
    if other.is_obsolete() {
        unit.make_obsolete();
    }
    for (name, message) in other.errors() {
        unit.add_error(&name, &message);
    }
}

fn copy_notes<U: TranslationUnit + ?Sized>(unit: &mut U, other: &dyn TranslationUnit) {
    for origin in [
        NoteOrigin::Translator,
        NoteOrigin::Developer,
        NoteOrigin::SourceCode,
    ] {
        let text = other.notes(Some(origin));
        if !text.is_empty() && unit.notes(Some(origin)) != text {
            unit.add_note(&text, origin);
        }
    }
}

/// Joins note lines the way every codec reports them.
pub(crate) fn join_notes<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines.into_iter().collect::<Vec<_>>().join("\n")
}

/// Plain in-memory unit, used by tests and as a neutral carrier between stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleUnit {
    pub source: Multistring,
    pub target: Option<Multistring>,
    pub id: Option<String>,
    pub context: Option<String>,
    pub locations: Vec<String>,
    pub notes: Vec<(NoteOrigin, String)>,
    pub fuzzy: bool,
    pub obsolete: bool,
    pub review: bool,
    pub translatable: bool,
    pub errors: UnitErrors,
}

impl SimpleUnit {
    pub fn new(source: impl Into<Multistring>) -> Self {
        Self {
            source: source.into(),
            translatable: true,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<Multistring>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn fuzzy(mut self) -> Self {
        self.fuzzy = true;
        self
    }
}

impl TranslationUnit for SimpleUnit {
    fn source(&self) -> Multistring {
        self.source.clone()
    }

    fn set_source(&mut self, source: Multistring) {
        self.source = source;
    }

    fn target(&self) -> Option<Multistring> {
        self.target.clone()
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        self.target = target;
    }

    fn has_plural(&self) -> bool {
        self.source.is_plural()
    }

    fn id(&self) -> String {
        match (&self.id, &self.context) {
            (Some(id), _) => id.clone(),
            (None, Some(context)) => format!("{}\u{4}{}", context, self.source.as_str()),
            (None, None) => self.source.as_str().to_string(),
        }
    }

    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    fn context(&self) -> Option<String> {
        self.context.clone()
    }

    fn locations(&self) -> Vec<String> {
        self.locations.clone()
    }

    fn add_location(&mut self, location: &str) {
        self.locations.push(location.to_string());
    }

    fn notes(&self, origin: Option<NoteOrigin>) -> String {
        join_notes(
            self.notes
                .iter()
                .filter(|(o, _)| origin.map_or(true, |wanted| *o == wanted))
                .map(|(_, text)| text.as_str()),
        )
    }

    fn add_note(&mut self, text: &str, origin: NoteOrigin) {
        self.notes.push((origin, text.to_string()));
    }

    fn remove_notes(&mut self) {
        self.notes.clear();
    }

    fn is_fuzzy(&self) -> bool {
        self.fuzzy
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

    fn is_review(&self) -> bool {
        self.review
    }

    fn mark_review_needed(&mut self, needed: bool, _explanation: Option<&str>) {
        self.review = needed;
    }

    fn is_translatable(&self) -> bool {
        self.translatable
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_unit_is_never_translated() {
        let unit = SimpleUnit::new("Open").with_target("Oopen").fuzzy();
        assert!(!unit.is_translated());
    }

    #[test]
    fn absent_target_is_untranslated() {
        let unit = SimpleUnit::new("Open");
        assert!(!unit.is_translated());
        assert!(!unit.is_blank());
    }

    #[test]
    fn blank_requires_empty_source_and_target() {
        assert!(SimpleUnit::new("").is_blank());
        assert!(!SimpleUnit::new("").with_target("x").is_blank());
    }

    #[test]
    fn merge_fills_empty_target() {
        let mut local = SimpleUnit::new("Save");
        let incoming = SimpleUnit::new("Save").with_target("Stoor").fuzzy();
        local.merge_from(&incoming, false, true);
        assert_eq!(local.target().unwrap(), "Stoor");
        assert!(local.is_fuzzy());
    }

    #[test]
    fn merge_keeps_translated_target_without_overwrite() {
        let mut local = SimpleUnit::new("Save").with_target("Stoor");
        let incoming = SimpleUnit::new("Save").with_target("Bewaar");
        local.merge_from(&incoming, false, true);
        assert_eq!(local.target().unwrap(), "Stoor");
    }

    #[test]
    fn merge_never_blanks_with_overwrite() {
        let mut local = SimpleUnit::new("Save").with_target("Stoor");
        let incoming = SimpleUnit::new("Save");
        local.merge_from(&incoming, true, true);
        assert_eq!(local.target().unwrap(), "Stoor");
    }

    #[test]
    fn merge_copies_notes_only_with_comments() {
        let mut incoming = SimpleUnit::new("Save").with_target("Stoor");
        incoming.add_note("verb", NoteOrigin::Developer);

        let mut without = SimpleUnit::new("Save");
        without.merge_from(&incoming, false, false);
        assert_eq!(without.notes(None), "");

        let mut with = SimpleUnit::new("Save");
        with.merge_from(&incoming, false, true);
        assert_eq!(with.notes(Some(NoteOrigin::Developer)), "verb");
    }

    #[test]
    fn context_joins_into_id() {
        let mut unit = SimpleUnit::new("Open");
        unit.context = Some("menu".to_string());
        assert_eq!(unit.id(), "menu\u{4}Open");
    }
}
