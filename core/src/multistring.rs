/// A string value carrying one or more grammatical plural variants.
///
/// Index 0 is the singular/default form. The value always holds at least one
/// variant; an "empty" multistring is a single empty string.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Multistring {
    strings: Vec<String>,
}

impl Multistring {
    pub fn new(strings: Vec<String>) -> Self {
        if strings.is_empty() {
            return Self::default();
        }
        Self { strings }
    }

    pub fn plural<S: Into<String>>(forms: impl IntoIterator<Item = S>) -> Self {
        Self::new(forms.into_iter().map(Into::into).collect())
    }

    /// The singular/default form.
    pub fn as_str(&self) -> &str {
        &self.strings[0]
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn into_strings(self) -> Vec<String> {
        self.strings
    }

    /// Number of variants, always at least one.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_plural(&self) -> bool {
        self.strings.len() > 1
    }

    /// True when every variant is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.iter().all(|s| s.is_empty())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Returns a copy padded with empty variants or truncated to `len` forms.
    pub fn resized(&self, len: usize) -> Self {
        let mut strings = self.strings.clone();
        strings.resize(len.max(1), String::new());
        Self { strings }
    }
}

impl Default for Multistring {
    fn default() -> Self {
        Self {
            strings: vec![String::new()],
        }
    }
}

impl PartialEq for Multistring {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
    }
}

// A plain string matches on the first variant only.
impl PartialEq<str> for Multistring {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Multistring {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for Multistring {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for Multistring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Multistring {
    fn from(value: &str) -> Self {
        Self {
            strings: vec![value.to_string()],
        }
    }
}

impl From<String> for Multistring {
    fn from(value: String) -> Self {
        Self {
            strings: vec![value],
        }
    }
}

impl From<Vec<String>> for Multistring {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<Multistring> for Vec<String> {
    fn from(value: Multistring) -> Self {
        value.strings
    }
}
