//! Exact and approximate lookup against a knowledge store

use super::knowledge::KnowledgeStore;
use super::normalize::normalize;

/// Default minimum similarity for a fuzzy match
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// A successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    /// The normalized utterance is a stored key
    Exact { value: String },

    /// The closest stored key cleared the similarity threshold
    Fuzzy {
        key: String,
        value: String,
        ratio: f64,
    },
}

impl Match {
    pub fn value(&self) -> &str {
        match self {
            Match::Exact { value } | Match::Fuzzy { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Resolve an utterance to a stored response.
    ///
    /// Exact matches always win. Otherwise the key with the highest
    /// similarity at or above the threshold is used; on equal ratios the
    /// lexicographically first key is kept.
    pub fn resolve(&self, utterance: &str, store: &KnowledgeStore) -> Option<Match> {
        let key = normalize(utterance);

        if let Some(value) = store.get(&key) {
            tracing::debug!("Exact match for '{}'", key);
            return Some(Match::Exact {
                value: value.to_string(),
            });
        }

        let mut best: Option<(&str, &str, f64)> = None;
        for (candidate, value) in store.iter() {
            let ratio = similarity(&key, candidate);
            if ratio < self.threshold {
                continue;
            }
            if best.map_or(true, |(_, _, best_ratio)| ratio > best_ratio) {
                best = Some((candidate, value, ratio));
            }
        }

        match best {
            Some((candidate, value, ratio)) => {
                tracing::debug!("Fuzzy match '{}' -> '{}' ({:.2})", key, candidate, ratio);
                Some(Match::Fuzzy {
                    key: candidate.to_string(),
                    value: value.to_string(),
                    ratio,
                })
            }
            None => {
                tracing::debug!("No match for '{}'", key);
                None
            }
        }
    }
}

/// Similarity in `[0, 1]` derived from the Levenshtein distance over chars,
/// scaled by the longer string. Identical strings score 1.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
