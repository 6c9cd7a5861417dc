/// Configuration for parsing, merging, terminology matching and caching
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hints supplied alongside raw content when parsing a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    /// Monolingual formats read values as source text only.
    pub template: bool,
    /// Used for synthetic locations by the extraction codecs.
    pub filename: Option<String>,
}

impl ParseOptions {
    pub fn template() -> Self {
        Self {
            template: true,
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// When the merge may replace an existing LOCAL target.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OverwritePolicy {
    /// Replacing a translated target is a policy violation.
    Never,
    /// Only empty LOCAL targets are filled.
    #[default]
    Untranslated,
    /// Incoming translations win.
    Always,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    pub allow_new_strings: bool,
    pub suggestions: bool,
    pub notranslate: bool,
    pub obsolete_missing: bool,
    pub overwrite: OverwritePolicy,
    /// Recorded on emitted suggestions.
    pub author: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            allow_new_strings: true,
            suggestions: false,
            notranslate: false,
            obsolete_missing: true,
            overwrite: OverwritePolicy::Untranslated,
            author: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MatcherOptions {
    pub max_candidates: usize,
    /// Minimum score, 0..=100.
    pub min_similarity: u8,
    /// Terms longer than this many characters are not indexed.
    pub max_length: usize,
    pub index_targets: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            min_similarity: 75,
            max_length: 70,
            index_targets: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub parse: ParseOptions,
    pub merge: MergeOptions,
    pub matcher: MatcherOptions,
    pub cache: CacheOptions,
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config file: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse JSON config: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))
    }
}
