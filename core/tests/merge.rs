//! Merge laws and the template update scenario, run against real codecs

use translation_store_core::formats::{new_store, parse_store, FileFormat};
use translation_store_core::{
    merge_stores, MergeOptions, Multistring, OverwritePolicy, ParseOptions, SimpleUnit, StoreError,
    TranslationStore,
};

const FIXTURE_LOCAL: &str = include_str!("fixtures/local.po");
const FIXTURE_TEMPLATE: &str = include_str!("fixtures/template.pot");
const FIXTURE_UPLOAD: &str = include_str!("fixtures/upload.po");
const FIXTURE_XLIFF: &str = include_str!("fixtures/sample.xlf");

fn parse(format: FileFormat, raw: &str) -> Box<dyn TranslationStore> {
    parse_store(format, raw, &ParseOptions::default()).unwrap().0
}

/// Builds a store of `format` out of plain units.
fn store_of(format: FileFormat, units: &[SimpleUnit]) -> Box<dyn TranslationStore> {
    let mut store = new_store(format).unwrap();
    for unit in units {
        store.add_unit_from(unit);
    }
    store
}

fn target_of(store: &dyn TranslationStore, id: &str) -> Option<Multistring> {
    store.unit(store.find_id(id)?)?.target()
}

#[test]
fn test_law_a_empty_local_target_is_filled() {
    for format in [FileFormat::Po, FileFormat::Xliff, FileFormat::Ts, FileFormat::Csv] {
        let mut local = store_of(format, &[SimpleUnit::new("Open")]);
        let incoming = store_of(format, &[SimpleUnit::new("Open").with_target("Oop")]);
        let id = incoming.unit(0).unwrap().id();

        merge_stores(local.as_mut(), incoming.as_ref(), &MergeOptions::default()).unwrap();
        assert_eq!(target_of(local.as_ref(), &id), Some(Multistring::from("Oop")), "{}", format);
    }
}

#[test]
fn test_law_b_suggestions_do_not_overwrite() {
    for format in [FileFormat::Po, FileFormat::Xliff, FileFormat::Ts] {
        let mut local = store_of(format, &[SimpleUnit::new("Open").with_target("Oop")]);
        let incoming = store_of(format, &[SimpleUnit::new("Open").with_target("Maak oop")]);
        let id = local.unit(0).unwrap().id();
        let options = MergeOptions {
            suggestions: true,
            ..MergeOptions::default()
        };

        let outcome = merge_stores(local.as_mut(), incoming.as_ref(), &options).unwrap();
        assert_eq!(target_of(local.as_ref(), &id), Some(Multistring::from("Oop")), "{}", format);
        assert_eq!(outcome.suggestions.len(), 1, "{}", format);
        assert_eq!(outcome.suggestions[0].proposed_target, "Maak oop");
    }
}

#[test]
fn test_law_c_missing_units_follow_obsolete_option() {
    let local_units = [
        SimpleUnit::new("Open").with_target("Oop"),
        SimpleUnit::new("Close").with_target("Maak toe"),
    ];
    let incoming = store_of(FileFormat::Po, &[SimpleUnit::new("Open")]);

    let mut local = store_of(FileFormat::Po, &local_units);
    merge_stores(local.as_mut(), incoming.as_ref(), &MergeOptions::default()).unwrap();
    assert_eq!(local.unit_count(), 2);
    assert!(local.unit(local.find_id("Close").unwrap()).unwrap().is_obsolete());

    let mut local = store_of(FileFormat::Po, &local_units);
    let options = MergeOptions {
        obsolete_missing: false,
        ..MergeOptions::default()
    };
    merge_stores(local.as_mut(), incoming.as_ref(), &options).unwrap();
    assert_eq!(local.unit_count(), 2);
    let close = local.unit(local.find_id("Close").unwrap()).unwrap();
    assert!(!close.is_obsolete());
    assert_eq!(close.target(), Some(Multistring::from("Maak toe")));
}

#[test]
fn test_law_d_new_units_need_allow_new_strings() {
    let mut local = store_of(FileFormat::Po, &[SimpleUnit::new("Open")]);
    let incoming = store_of(FileFormat::Po, &[SimpleUnit::new("Open"), SimpleUnit::new("Save")]);
    let options = MergeOptions {
        allow_new_strings: false,
        ..MergeOptions::default()
    };
    let outcome = merge_stores(local.as_mut(), incoming.as_ref(), &options).unwrap();
    assert_eq!(local.unit_count(), 1);
    assert_eq!(local.find_id("Save"), None);
    assert_eq!(outcome.added, 0);
}

#[test]
fn test_template_update_scenario() {
    let mut local = parse(FileFormat::Po, FIXTURE_LOCAL);
    let template = parse(FileFormat::Pot, FIXTURE_TEMPLATE);
    let options = MergeOptions {
        allow_new_strings: true,
        obsolete_missing: true,
        ..MergeOptions::default()
    };

    let outcome = merge_stores(local.as_mut(), template.as_ref(), &options).unwrap();

    let exact = local.unit(local.find_id("Exact").unwrap()).unwrap();
    assert_eq!(exact.target(), Some(Multistring::from("Belzabt")));
    assert!(!exact.is_fuzzy());

    let fuzzy = local.unit(local.find_id("Fuzzy").unwrap()).unwrap();
    assert_eq!(fuzzy.target(), Some(Multistring::from("ta2riban")));
    assert!(fuzzy.is_fuzzy());

    let added = local.unit(local.find_id("%d new").unwrap()).unwrap();
    assert!(added.has_plural());
    assert_eq!(added.source().len(), 2);
    assert!(!added.is_translated());

    assert!(local.unit(local.find_id("obsolete").unwrap()).unwrap().is_obsolete());

    let stats = local.stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.obsolete, 1);
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.obsoleted, 1);
    assert!(outcome.suggestions.is_empty());

    let header = local.header_fields();
    let field = |key: &str| header.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    assert_eq!(field("Project-Id-Version"), Some("demo 1.1"));
    assert_eq!(field("POT-Creation-Date"), Some("2024-03-01 10:00+0000"));
    assert_eq!(field("Language"), Some("ar"));
}

#[test]
fn test_merged_store_survives_serialization() {
    let mut local = parse(FileFormat::Po, FIXTURE_LOCAL);
    let template = parse(FileFormat::Pot, FIXTURE_TEMPLATE);
    merge_stores(local.as_mut(), template.as_ref(), &MergeOptions::default()).unwrap();

    let text = local.serialize().unwrap();
    assert!(text.contains("#~ msgid \"obsolete\""));
    assert!(text.contains("msgid_plural \"%d new\""));
    let again = parse(FileFormat::Po, &text);
    assert_eq!(again.stats(), local.stats());
}

#[test]
fn test_upload_with_suggestions() {
    let mut local = parse(FileFormat::Po, FIXTURE_LOCAL);
    let upload = parse(FileFormat::Po, FIXTURE_UPLOAD);
    let options = MergeOptions {
        suggestions: true,
        obsolete_missing: false,
        author: "uploader".to_string(),
        ..MergeOptions::default()
    };

    let outcome = merge_stores(local.as_mut(), upload.as_ref(), &options).unwrap();

    // "Exact" is translated, so the upload only suggests; "Fuzzy" keeps its
    // non-empty target under the default policy.
    assert_eq!(target_of(local.as_ref(), "Exact"), Some(Multistring::from("Belzabt")));
    assert_eq!(target_of(local.as_ref(), "Fuzzy"), Some(Multistring::from("ta2riban")));
    assert_eq!(target_of(local.as_ref(), "Extra"), Some(Multistring::from("Idafi")));
    assert_eq!(outcome.suggestions.len(), 1);
    assert_eq!(outcome.suggestions[0].unit_id, "Exact");
    assert_eq!(outcome.suggestions[0].author, "uploader");
    assert!(!local.unit(local.find_id("obsolete").unwrap()).unwrap().is_obsolete());
}

#[test]
fn test_forbidden_overwrite_leaves_local_untouched() {
    let mut local = parse(FileFormat::Po, FIXTURE_LOCAL);
    let upload = parse(FileFormat::Po, FIXTURE_UPLOAD);
    let before = local.serialize().unwrap();
    let options = MergeOptions {
        overwrite: OverwritePolicy::Never,
        ..MergeOptions::default()
    };

    let err = merge_stores(local.as_mut(), upload.as_ref(), &options).unwrap_err();
    assert!(matches!(err, StoreError::MergeConflictPolicy { .. }));
    assert_eq!(local.serialize().unwrap(), before);
}

#[test]
fn test_overwrite_always_takes_incoming_translations() {
    let mut local = parse(FileFormat::Po, FIXTURE_LOCAL);
    let upload = parse(FileFormat::Po, FIXTURE_UPLOAD);
    let options = MergeOptions {
        overwrite: OverwritePolicy::Always,
        obsolete_missing: false,
        ..MergeOptions::default()
    };

    merge_stores(local.as_mut(), upload.as_ref(), &options).unwrap();
    assert_eq!(target_of(local.as_ref(), "Exact"), Some(Multistring::from("Bil-zabt")));
    let fuzzy = local.unit(local.find_id("Fuzzy").unwrap()).unwrap();
    assert_eq!(fuzzy.target(), Some(Multistring::from("Taqriban")));
    assert!(!fuzzy.is_fuzzy());
}

#[test]
fn test_merge_across_formats() {
    let mut local = parse(FileFormat::Xliff, FIXTURE_XLIFF);
    let incoming = store_of(
        FileFormat::Po,
        &[SimpleUnit::new("Added later").with_target("Later bygevoeg")],
    );
    let options = MergeOptions {
        obsolete_missing: false,
        ..MergeOptions::default()
    };

    let outcome = merge_stores(local.as_mut(), incoming.as_ref(), &options).unwrap();
    assert_eq!(outcome.added, 1);
    let again = parse(FileFormat::Xliff, &local.serialize().unwrap());
    assert_eq!(again.translate("Added later"), Some(Multistring::from("Later bygevoeg")));
}
