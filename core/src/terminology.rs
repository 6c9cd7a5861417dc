/// Terminology matcher
///
/// Indexes the source text of glossary stores by lowercase character
/// trigrams and ranks glossary entries against a piece of text. Stores and
/// single units can be added at any time; the index grows in place.
use crate::config::MatcherOptions;
use crate::store::TranslationStore;
use crate::unit::TranslationUnit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermMatch {
    /// Number handed out by [`TermMatcher::add_store`].
    pub store: usize,
    /// Unit position inside that store.
    pub unit: usize,
    pub source: String,
    pub target: Option<String>,
    pub score: u8,
}

#[derive(Debug, Clone)]
struct Term {
    store: usize,
    unit: usize,
    source: String,
    target: Option<String>,
    /// Lowercased texts this term is matched by.
    keys: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TermMatcher {
    options: MatcherOptions,
    terms: Vec<Term>,
    trigrams: HashMap<String, Vec<usize>>,
    /// Terms too short to have a trigram; checked on every lookup.
    short: Vec<usize>,
    stores: usize,
}

fn trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

fn is_word_char(c: Option<char>) -> bool {
    c.map_or(false, |c| c.is_alphanumeric() || c == '_')
}

/// True when `needle` occurs in `haystack` with word boundaries on both sides.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, found)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + found.len()..].chars().next();
        !is_word_char(before) && !is_word_char(after)
    })
}

fn score_key(key: &str, text: &str, text_grams: &HashSet<String>) -> u8 {
    if contains_word(text, key) {
        return 100;
    }
    let grams = trigrams(key);
    if grams.is_empty() {
        return 0;
    }
    let shared = grams.iter().filter(|g| text_grams.contains(*g)).count();
    (shared * 100 / grams.len()) as u8
}

impl TermMatcher {
    pub fn new(options: MatcherOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Number of indexed terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Index every usable unit of `store`; returns the store number used in
    /// matches.
    pub fn add_store(&mut self, store: &dyn TranslationStore) -> usize {
        let number = self.stores;
        self.stores += 1;
        let before = self.terms.len();
        for (position, unit) in store.units().enumerate() {
            self.add_unit(number, position, unit);
        }
        log::debug!(
            "terminology: store {} contributed {} terms",
            number,
            self.terms.len() - before
        );
        number
    }

    /// Index one unit. Returns false when the unit is not a usable term.
    pub fn add_unit(&mut self, store: usize, position: usize, unit: &dyn TranslationUnit) -> bool {
        if unit.is_header() || unit.is_obsolete() || !unit.is_translatable() {
            return false;
        }
        let source = unit.source().to_string();
        let source = source.trim();
        let target = unit
            .target()
            .map(|t| t.to_string())
            .filter(|t| !t.trim().is_empty());
        if source.is_empty() || target.is_none() {
            return false;
        }
        if source.chars().count() > self.options.max_length {
            log::trace!("terminology: {:?} is too long to be a term", source);
            return false;
        }

        let mut keys = vec![source.to_lowercase()];
        if self.options.index_targets {
            if let Some(target) = &target {
                let key = target.trim().to_lowercase();
                if !keys.contains(&key) && key.chars().count() <= self.options.max_length {
                    keys.push(key);
                }
            }
        }

        let index = self.terms.len();
        let mut short = false;
        for key in &keys {
            let grams = trigrams(key);
            short |= grams.is_empty();
            for gram in grams {
                let postings = self.trigrams.entry(gram).or_default();
                if postings.last() != Some(&index) {
                    postings.push(index);
                }
            }
        }
        if short {
            self.short.push(index);
        }
        self.terms.push(Term {
            store,
            unit: position,
            source: source.to_string(),
            target,
            keys,
        });
        true
    }

    /// Terms relevant to `text`, best first, ties in insertion order.
    pub fn matches(&self, text: &str) -> Vec<TermMatch> {
        let text = text.to_lowercase();
        let text_grams = trigrams(&text);

        let mut candidates: Vec<usize> = text_grams
            .iter()
            .filter_map(|gram| self.trigrams.get(gram))
            .flatten()
            .chain(self.short.iter())
            .copied()
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut found: Vec<(u8, usize)> = candidates
            .into_iter()
            .filter_map(|index| {
                let term = &self.terms[index];
                let score = term
                    .keys
                    .iter()
                    .map(|key| score_key(key, &text, &text_grams))
                    .max()
                    .unwrap_or(0);
                (score > 0 && score >= self.options.min_similarity).then_some((score, index))
            })
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        found.truncate(self.options.max_candidates);

        found
            .into_iter()
            .map(|(score, index)| {
                let term = &self.terms[index];
                TermMatch {
                    store: term.store,
                    unit: term.unit,
                    source: term.source.clone(),
                    target: term.target.clone(),
                    score,
                }
            })
            .collect()
    }
}
