/// Bounded cache of parsed stores keyed by document path
///
/// A store is used through a [`CheckedOutStore`]: while one is out, nobody
/// else can check out the same path, and the entry cannot be evicted.
/// Releasing it puts the store back and writes it through the caller's
/// writer if it was changed.
use crate::config::{CacheOptions, ParseOptions};
use crate::error::StoreError;
use crate::formats::{self, FileFormat};
use crate::store::TranslationStore;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive handle on a cached store.
pub struct CheckedOutStore {
    path: PathBuf,
    store: Box<dyn TranslationStore>,
    dirty: bool,
}

impl fmt::Debug for CheckedOutStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedOutStore")
            .field("path", &self.path)
            .field("format", &self.store.format())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl CheckedOutStore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &dyn TranslationStore {
        self.store.as_ref()
    }

    /// Mutable access; the store will be persisted on release.
    pub fn store_mut(&mut self) -> &mut dyn TranslationStore {
        self.dirty = true;
        self.store.as_mut()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[derive(Debug)]
struct Entry {
    /// `None` while checked out.
    store: Option<Box<dyn TranslationStore>>,
    last_used: u64,
}

#[derive(Debug)]
pub struct StoreCache {
    capacity: usize,
    clock: u64,
    entries: HashMap<PathBuf, Entry>,
}

impl StoreCache {
    pub fn new(options: &CacheOptions) -> Self {
        Self::with_capacity(options.capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries held, checked out or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_checked_out(&self, path: &Path) -> bool {
        self.entries.get(path).map_or(false, |entry| entry.store.is_none())
    }

    /// Take exclusive hold of the store for `path`, loading it with `loader`
    /// when it is not resident.
    pub fn checkout<F>(&mut self, path: impl AsRef<Path>, loader: F) -> Result<CheckedOutStore, StoreError>
    where
        F: FnOnce(&Path) -> Result<Box<dyn TranslationStore>, StoreError>,
    {
        let path = path.as_ref();
        let tick = self.tick();
        let store = match self.entries.get_mut(path) {
            Some(entry) => {
                let store = entry
                    .store
                    .take()
                    .ok_or_else(|| StoreError::CheckedOut(path.display().to_string()))?;
                entry.last_used = tick;
                log::trace!("cache: hit for {}", path.display());
                store
            }
            None => {
                log::debug!("cache: loading {}", path.display());
                let store = loader(path)?;
                self.entries.insert(
                    path.to_path_buf(),
                    Entry {
                        store: None,
                        last_used: tick,
                    },
                );
                self.evict();
                store
            }
        };
        Ok(CheckedOutStore {
            path: path.to_path_buf(),
            store,
            dirty: false,
        })
    }

    /// Return a checked-out store. Dirty stores are written with `persist`
    /// first; the store goes back into the cache even when that fails.
    pub fn release<W>(&mut self, checkout: CheckedOutStore, persist: W) -> Result<(), StoreError>
    where
        W: FnOnce(&Path, &dyn TranslationStore) -> Result<(), StoreError>,
    {
        let CheckedOutStore { path, store, dirty } = checkout;
        let result = if dirty {
            log::debug!("cache: persisting {}", path.display());
            persist(&path, store.as_ref())
        } else {
            Ok(())
        };
        if let Err(err) = &result {
            log::warn!("cache: failed to persist {}: {}", path.display(), err);
        }

        let tick = self.tick();
        let entry = self.entries.entry(path).or_insert(Entry {
            store: None,
            last_used: tick,
        });
        entry.store = Some(store);
        entry.last_used = tick;
        self.evict();
        result
    }

    /// Drop the resident copy of `path` so the next checkout reloads it.
    /// Returns false when the store is checked out or not cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        if self.is_checked_out(path) {
            return false;
        }
        self.entries.remove(path).is_some()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Drop least recently used idle entries until within capacity.
    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.store.is_some())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(path, _)| path.clone());
            let Some(victim) = victim else {
                break;
            };
            log::debug!("cache: evicting {}", victim.display());
            self.entries.remove(&victim);
        }
    }
}

/// Loader for [`StoreCache::checkout`]: reads the file and parses it with the
/// format its extension names.
pub fn read_store(path: &Path, options: &ParseOptions) -> Result<Box<dyn TranslationStore>, StoreError> {
    let raw = fs::read(path)?;
    let mut options = options.clone();
    if options.filename.is_none() {
        options.filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
    }
    let (store, report) = formats::parse_store_bytes(FileFormat::from_path(path), &raw, &options)?;
    for warning in &report.warnings {
        log::warn!("{}: {}", path.display(), warning);
    }
    Ok(store)
}

/// Writer for [`StoreCache::release`]: serializes to a temporary sibling and
/// swaps it into place.
pub fn write_store(path: &Path, store: &dyn TranslationStore) -> Result<(), StoreError> {
    let contents = store.serialize_bytes()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(&contents)?;
    file.sync_all()?;
    drop(file);

    #[cfg(target_os = "windows")]
    {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let suffix = format!("__tmp__pid_{}", std::process::id());
    match temp.file_name() {
        Some(name) => {
            let mut name = name.to_os_string();
            name.push(suffix);
            temp.set_file_name(name);
        }
        None => temp.push(format!("store{}", suffix)),
    }
    temp
}
