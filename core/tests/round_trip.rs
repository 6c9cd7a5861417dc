//! Round-trip tests for every two-way codec
//!
//! Files whose layout the codec reproduces byte for byte are checked for
//! identity; the rest must reach a fixed point after one serialization.

use translation_store_core::formats::{new_store, parse_store, FileFormat};
use translation_store_core::{Multistring, ParseOptions, TranslationStore};

const FIXTURE_PO: &str = include_str!("fixtures/sample.po");
const FIXTURE_XLIFF: &str = include_str!("fixtures/sample.xlf");
const FIXTURE_POXLIFF: &str = include_str!("fixtures/sample_po.xlf");
const FIXTURE_TS: &str = include_str!("fixtures/sample.ts");
const FIXTURE_TMX: &str = include_str!("fixtures/sample.tmx");
const FIXTURE_DTD: &str = include_str!("fixtures/sample.dtd");
const FIXTURE_PROPERTIES: &str = include_str!("fixtures/sample.properties");
const FIXTURE_PHP: &str = include_str!("fixtures/sample.php");
const FIXTURE_INI: &str = include_str!("fixtures/sample.ini");
const FIXTURE_CATKEYS: &str = include_str!("fixtures/sample.catkeys");
const FIXTURE_CSV: &str = include_str!("fixtures/sample.csv");
const FIXTURE_LANG: &str = include_str!("fixtures/sample.lang");
const FIXTURE_SRT: &str = include_str!("fixtures/sample.srt");
const FIXTURE_WORDFAST: &str = include_str!("fixtures/sample.txt");

fn parse(format: FileFormat, raw: &str) -> Box<dyn TranslationStore> {
    let (store, report) = parse_store(format, raw, &ParseOptions::default())
        .unwrap_or_else(|err| panic!("{} fixture failed to parse: {}", format, err));
    assert!(report.is_clean(), "{} fixture has warnings: {:?}", format, report.warnings);
    store
}

fn assert_identical(format: FileFormat, raw: &str) {
    let out = parse(format, raw).serialize().unwrap();
    assert_eq!(out, raw, "{} round trip changed the file", format);
}

fn assert_fixed_point(format: FileFormat, raw: &str) {
    let first = parse(format, raw).serialize().unwrap();
    let second = parse(format, &first).serialize().unwrap();
    assert_eq!(first, second, "{} serialization is not idempotent", format);
}

/// Translation state as seen through the generic interface.
fn snapshot(store: &dyn TranslationStore) -> Vec<(String, Multistring, Option<Multistring>, bool, bool)> {
    store
        .units()
        .map(|unit| {
            (
                unit.id(),
                unit.source(),
                unit.target(),
                unit.is_fuzzy(),
                unit.is_obsolete(),
            )
        })
        .collect()
}

#[test]
fn test_layout_preserving_formats_round_trip_exactly() {
    for (format, raw) in [
        (FileFormat::Xliff, FIXTURE_XLIFF),
        (FileFormat::Xliff, FIXTURE_POXLIFF),
        (FileFormat::Ts, FIXTURE_TS),
        (FileFormat::Tmx, FIXTURE_TMX),
        (FileFormat::Php, FIXTURE_PHP),
        (FileFormat::Ini, FIXTURE_INI),
        (FileFormat::Catkeys, FIXTURE_CATKEYS),
        (FileFormat::Lang, FIXTURE_LANG),
        (FileFormat::Srt, FIXTURE_SRT),
        (FileFormat::Wordfast, FIXTURE_WORDFAST),
    ] {
        assert_identical(format, raw);
    }
}

#[test]
fn test_serialization_is_idempotent() {
    for (format, raw) in [
        (FileFormat::Po, FIXTURE_PO),
        (FileFormat::Xliff, FIXTURE_XLIFF),
        (FileFormat::Ts, FIXTURE_TS),
        (FileFormat::Dtd, FIXTURE_DTD),
        (FileFormat::Properties, FIXTURE_PROPERTIES),
        (FileFormat::Csv, FIXTURE_CSV),
    ] {
        assert_fixed_point(format, raw);
    }
}

#[test]
fn test_reparse_keeps_translation_state() {
    for (format, raw) in [
        (FileFormat::Po, FIXTURE_PO),
        (FileFormat::Xliff, FIXTURE_XLIFF),
        (FileFormat::Xliff, FIXTURE_POXLIFF),
        (FileFormat::Ts, FIXTURE_TS),
        (FileFormat::Csv, FIXTURE_CSV),
        (FileFormat::Properties, FIXTURE_PROPERTIES),
    ] {
        let store = parse(format, raw);
        let again = parse(format, &store.serialize().unwrap());
        assert_eq!(snapshot(again.as_ref()), snapshot(store.as_ref()), "{}", format);
    }
}

#[test]
fn test_poxliff_is_sniffed_from_content() {
    let store = parse(FileFormat::Xliff, FIXTURE_POXLIFF);
    assert_eq!(store.format(), FileFormat::PoXliff);
    let plural = store
        .units()
        .find(|unit| unit.has_plural())
        .expect("plural group");
    assert_eq!(plural.source().len(), 2);
    assert_eq!(plural.child_ids(), vec!["3", "3[0]", "3[1]"]);
}

#[test]
fn test_edits_survive_a_round_trip() {
    for (format, raw) in [
        (FileFormat::Po, FIXTURE_PO),
        (FileFormat::Xliff, FIXTURE_XLIFF),
        (FileFormat::Ts, FIXTURE_TS),
        (FileFormat::Lang, FIXTURE_LANG),
        (FileFormat::Ini, FIXTURE_INI),
    ] {
        let mut store = parse(format, raw);
        let index = store.add_source_unit(Multistring::from("Brand new"));
        let unit = store.unit_mut(index).unwrap();
        unit.set_target(Some(Multistring::from("Splinternuut")));
        let id = unit.id();

        let again = parse(format, &store.serialize().unwrap());
        let found = again.find_id(&id).unwrap_or_else(|| panic!("{} lost the new unit", format));
        assert_eq!(
            again.unit(found).unwrap().target(),
            Some(Multistring::from("Splinternuut")),
            "{}",
            format
        );
    }
}

#[test]
fn test_empty_stores_serialize_and_parse_back() {
    for format in [
        FileFormat::Po,
        FileFormat::Xliff,
        FileFormat::Ts,
        FileFormat::Qph,
        FileFormat::Tmx,
        FileFormat::Tbx,
        FileFormat::Dtd,
        FileFormat::Properties,
        FileFormat::Php,
        FileFormat::Lang,
    ] {
        let store = new_store(format).unwrap();
        assert!(store.is_empty());
        let out = store.serialize().unwrap();
        let again = parse(format, &out);
        assert!(again.is_empty(), "{}", format);
    }
}

#[test]
fn test_fingerprint_follows_content() {
    let store = parse(FileFormat::Po, FIXTURE_PO);
    let same = parse(FileFormat::Po, FIXTURE_PO);
    assert_eq!(store.fingerprint().unwrap(), same.fingerprint().unwrap());

    let mut changed = parse(FileFormat::Po, FIXTURE_PO);
    let index = changed.find_unit("Open").unwrap();
    changed.unit_mut(index).unwrap().set_target(Some("Maak oop".into()));
    assert_ne!(store.fingerprint().unwrap(), changed.fingerprint().unwrap());
    assert_eq!(store.fingerprint().unwrap().len(), 64);
}

const ESCAPED_SOURCE: &str = "Say \"hi\" to 'Tom & Jerry'\tnow\nthen  ";
const ESCAPED_TARGET: &str = "Sê \"hallo\" vir 'Tom & Jerry'\tnou\ndan 😀  ";

/// One unit of each kind a translator meets: translated, untranslated,
/// fuzzy, plural with two and three forms, and text that needs escaping.
fn build_unit_set(format: FileFormat) -> Box<dyn TranslationStore> {
    let mut store = new_store(format).unwrap();
    store.set_header_field("Language", "af");
    store.set_header_field("Plural-Forms", "nplurals=3; plural=(n==1 ? 0 : n==2 ? 1 : 2);");

    let units: [(Multistring, Option<Multistring>, bool); 6] = [
        (Multistring::from("Open"), Some(Multistring::from("Oop")), false),
        (Multistring::from("Save"), None, false),
        (Multistring::from("Close"), Some(Multistring::from("Maak toe")), true),
        (
            Multistring::plural(["%d file", "%d files"]),
            Some(Multistring::plural(["%d lêer", "%d lêers"])),
            false,
        ),
        (
            Multistring::plural(["%d day", "%d days", "%d days (many)"]),
            Some(Multistring::plural(["%d dag", "%d dae", "%d dae (baie)"])),
            false,
        ),
        (Multistring::from(ESCAPED_SOURCE), Some(Multistring::from(ESCAPED_TARGET)), false),
    ];
    for (source, target, fuzzy) in units {
        let index = store.add_source_unit(source);
        let unit = store.unit_mut(index).unwrap();
        if target.is_some() {
            unit.set_target(target);
        }
        unit.mark_fuzzy(fuzzy);
    }
    store
}

fn flatten(text: &str) -> String {
    text.replace('\n', " ")
}

fn flatten_forms(text: &Multistring) -> Multistring {
    Multistring::new(text.strings().iter().map(|s| flatten(s)).collect())
}

fn trim_forms(text: &Multistring) -> Multistring {
    Multistring::new(text.strings().iter().map(|s| flatten(s).trim().to_string()).collect())
}

/// What a reparse can recover from the in-memory store: line-oriented
/// formats lose line breaks, INI also loses surrounding whitespace, and
/// Wordfast only writes translated units.
fn expected_snapshot(format: FileFormat, store: &dyn TranslationStore) -> Vec<(String, Multistring, Option<Multistring>, bool, bool)> {
    let kept: Vec<_> = store
        .units()
        .filter(|unit| format != FileFormat::Wordfast || unit.is_translated())
        .map(|unit| (unit.id(), unit.source(), unit.target(), unit.is_fuzzy(), unit.is_obsolete()))
        .collect();
    match format {
        FileFormat::Lang => kept
            .into_iter()
            .map(|(id, source, target, fuzzy, obsolete)| {
                (flatten(&id), flatten_forms(&source), target.as_ref().map(flatten_forms), fuzzy, obsolete)
            })
            .collect(),
        FileFormat::Ini => kept
            .into_iter()
            .map(|(id, source, target, fuzzy, obsolete)| {
                (flatten(&id).trim().to_string(), trim_forms(&source), target.as_ref().map(trim_forms), fuzzy, obsolete)
            })
            .collect(),
        _ => kept,
    }
}

#[test]
fn test_every_kind_of_unit_round_trips() {
    for format in [
        FileFormat::Po,
        FileFormat::Xliff,
        FileFormat::PoXliff,
        FileFormat::Ts,
        FileFormat::Qph,
        FileFormat::Tmx,
        FileFormat::Tbx,
        FileFormat::Dtd,
        FileFormat::Properties,
        FileFormat::Strings,
        FileFormat::Php,
        FileFormat::Catkeys,
        FileFormat::Csv,
        FileFormat::Lang,
        FileFormat::Ini,
        FileFormat::Wordfast,
    ] {
        let store = build_unit_set(format);
        let first = store.serialize().unwrap();
        let again = parse(format, &first);
        assert_eq!(
            snapshot(again.as_ref()),
            expected_snapshot(format, store.as_ref()),
            "{} lost state in a round trip",
            format
        );
        assert_eq!(again.serialize().unwrap(), first, "{} serialization is not idempotent", format);
    }
}
