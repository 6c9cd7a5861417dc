//! Store cache with real files on disk

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use translation_store_core::formats::FileFormat;
use translation_store_core::{
    merge_stores, parse_store, read_store, write_store, CacheOptions, MergeOptions, ParseOptions,
    StoreCache, StoreConfig, StoreError, TranslationStore,
};

const FIXTURE_LOCAL: &str = include_str!("fixtures/local.po");
const FIXTURE_TEMPLATE: &str = include_str!("fixtures/template.pot");

fn workspace() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ar").join("demo.po");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, FIXTURE_LOCAL).unwrap();
    (dir, path)
}

fn load(path: &Path) -> Result<Box<dyn TranslationStore>, StoreError> {
    read_store(path, &ParseOptions::default())
}

#[test]
fn test_update_from_template_is_persisted_on_release() {
    let (_dir, path) = workspace();
    let template = parse_store(FileFormat::Pot, FIXTURE_TEMPLATE, &ParseOptions::default())
        .unwrap()
        .0;
    let config = StoreConfig::default();
    let mut cache = StoreCache::new(&config.cache);

    let mut checkout = cache.checkout(&path, load).unwrap();
    let outcome = merge_stores(checkout.store_mut(), template.as_ref(), &config.merge).unwrap();
    assert_eq!(outcome.added, 1);
    cache.release(checkout, write_store).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("msgid \"%d new\""));
    assert!(written.contains("#~ msgid \"obsolete\""));

    let fresh = load(&path).unwrap();
    assert_eq!(fresh.stats().total, 4);
}

#[test]
fn test_clean_release_does_not_touch_the_file() {
    let (_dir, path) = workspace();
    let mut cache = StoreCache::new(&CacheOptions::default());

    let checkout = cache.checkout(&path, load).unwrap();
    assert_eq!(checkout.store().translate("Exact").map(|t| t.to_string()).as_deref(), Some("Belzabt"));
    fs::remove_file(&path).unwrap();
    cache.release(checkout, write_store).unwrap();
    assert!(!path.exists());

    // still resident, so no reload is attempted
    let checkout = cache.checkout(&path, load).unwrap();
    assert_eq!(checkout.path(), path.as_path());
    cache.release(checkout, write_store).unwrap();
}

#[test]
fn test_missing_file_fails_checkout_without_caching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.po");
    let mut cache = StoreCache::with_capacity(2);
    let err = cache.checkout(&path, load).unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));
    assert!(!cache.contains(&path));
    assert!(cache.is_empty());
}

#[test]
fn test_capacity_bounds_resident_stores() {
    let dir = TempDir::new().unwrap();
    let mut cache = StoreCache::with_capacity(2);
    let mut paths = Vec::new();
    for language in ["af", "ar", "de"] {
        let path = dir.path().join(format!("{}.po", language));
        fs::write(&path, FIXTURE_LOCAL).unwrap();
        let checkout = cache.checkout(&path, load).unwrap();
        cache.release(checkout, write_store).unwrap();
        paths.push(path);
    }
    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(&paths[0]));
    assert!(cache.contains(&paths[1]));
    assert!(cache.contains(&paths[2]));
}

#[test]
fn test_merge_options_come_from_config() {
    let config = StoreConfig::from_yaml_str("merge:\n  obsoleteMissing: false\ncache:\n  capacity: 3\n").unwrap();
    assert!(!config.merge.obsolete_missing);
    assert_eq!(StoreCache::new(&config.cache).capacity(), 3);

    let (_dir, path) = workspace();
    let template = parse_store(FileFormat::Pot, FIXTURE_TEMPLATE, &ParseOptions::default())
        .unwrap()
        .0;
    let mut cache = StoreCache::new(&config.cache);
    let mut checkout = cache.checkout(&path, load).unwrap();
    let outcome = merge_stores(checkout.store_mut(), template.as_ref(), &config.merge).unwrap();
    assert_eq!(outcome.obsoleted, 0);
    assert!(MergeOptions::default().obsolete_missing);
    cache.release(checkout, write_store).unwrap();
}
