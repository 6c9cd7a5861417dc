//! Terminology matching against a TBX glossary

use translation_store_core::formats::FileFormat;
use translation_store_core::{
    parse_store, MatcherOptions, Multistring, ParseOptions, TermMatcher, TranslationStore,
};

const FIXTURE_GLOSSARY: &str = include_str!("fixtures/glossary.tbx");

fn glossary() -> Box<dyn TranslationStore> {
    parse_store(FileFormat::Tbx, FIXTURE_GLOSSARY, &ParseOptions::default())
        .unwrap()
        .0
}

#[test]
fn test_glossary_terms_are_indexed() {
    let store = glossary();
    let mut matcher = TermMatcher::new(MatcherOptions::default());
    let number = matcher.add_store(store.as_ref());
    assert_eq!(number, 0);
    // "print preview" has no translation
    assert_eq!(matcher.len(), 4);
}

#[test]
fn test_matches_point_back_into_the_store() {
    let store = glossary();
    let mut matcher = TermMatcher::new(MatcherOptions::default());
    matcher.add_store(store.as_ref());

    let found = matcher.matches("Print the file to a printer");
    let terms: Vec<&str> = found.iter().map(|m| m.source.as_str()).collect();
    assert_eq!(terms, vec!["file", "printer"]);
    for term in &found {
        assert_eq!(term.score, 100);
        let unit = store.unit(term.unit).unwrap();
        assert_eq!(unit.source().as_str(), term.source);
        assert_eq!(unit.target().map(|t| t.to_string()), term.target);
    }
    assert_eq!(found[0].target.as_deref(), Some("lêer"));
}

#[test]
fn test_ranking_follows_score() {
    let store = glossary();
    let options = MatcherOptions {
        min_similarity: 40,
        ..MatcherOptions::default()
    };
    let mut matcher = TermMatcher::new(options);
    matcher.add_store(store.as_ref());

    // all trigrams of "file" occur in "files"; "printer" shares three of five
    let found = matcher.matches("Reprint the files");
    let ranked: Vec<(&str, u8)> = found.iter().map(|m| (m.source.as_str(), m.score)).collect();
    assert_eq!(ranked, vec![("file", 100), ("printer", 60)]);

    let found = matcher.matches("The folders");
    assert_eq!(found[0].source, "folder");
    assert_eq!(found[0].score, 100);
}

#[test]
fn test_several_stores_and_late_units() {
    let store = glossary();
    let mut matcher = TermMatcher::new(MatcherOptions::default());
    matcher.add_store(store.as_ref());

    let mut extra = parse_store(FileFormat::Po, "msgid \"window\"\nmsgstr \"venster\"\n", &ParseOptions::default())
        .unwrap()
        .0;
    let second = matcher.add_store(extra.as_ref());
    assert_eq!(second, 1);

    let index = extra.add_source_unit(Multistring::from("toolbar"));
    extra.unit_mut(index).unwrap().set_target(Some("nutsbalk".into()));
    assert!(matcher.add_unit(second, index, extra.unit(index).unwrap()));

    let found = matcher.matches("Hide the toolbar of this window");
    let hits: Vec<(usize, usize, &str)> = found
        .iter()
        .map(|m| (m.store, m.unit, m.source.as_str()))
        .collect();
    assert_eq!(hits, vec![(1, 0, "window"), (1, 1, "toolbar")]);
}

#[test]
fn test_translations_are_searchable_when_enabled() {
    let store = glossary();
    let options = MatcherOptions {
        index_targets: true,
        ..MatcherOptions::default()
    };
    let mut matcher = TermMatcher::new(options);
    matcher.add_store(store.as_ref());

    let found = matcher.matches("Druk die lêer");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].source, "file");
}
