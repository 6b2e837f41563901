//! Related-string suggestions.
//!
//! An inverted index from words of the base text to the strings using them.
//! A word that occurs inside a longer word also points at the longer word's
//! strings, scored by the length ratio, which catches most singular/plural
//! pairs without real stemming.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::debug;

/// Shortest word length that is indexed.
const MIN_WORD_LEN: usize = 4;

static COMMAND_SPAN_REGEX: OnceLock<Regex> = OnceLock::new();
static NON_WORD_REGEX: OnceLock<Regex> = OnceLock::new();

/// Distinct, lower-cased words of `text` worth indexing.
pub fn words_of(text: &str) -> BTreeSet<String> {
    let commands = COMMAND_SPAN_REGEX.get_or_init(|| Regex::new(r"\{[^}]*\}").unwrap());
    let separators = NON_WORD_REGEX.get_or_init(|| Regex::new(r"\W+").unwrap());

    let plain = commands.replace_all(text, " ");
    separators
        .split(&plain)
        .filter(|word| word.chars().count() >= MIN_WORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Word index over the base language's strings.
#[derive(Debug, Clone, Default)]
pub struct RelatedIndex {
    /// word -> string name -> score
    postings: BTreeMap<String, BTreeMap<String, f64>>,

    /// string name -> its words
    words: BTreeMap<String, BTreeSet<String>>,
}

impl RelatedIndex {
    /// Build the index from `(string name, base text)` pairs.
    pub fn build<'a>(strings: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut postings: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        let mut words = BTreeMap::new();

        for (name, text) in strings {
            let string_words = words_of(text);
            for word in &string_words {
                postings
                    .entry(word.clone())
                    .or_default()
                    .insert(name.to_string(), 1.0);
            }
            words.insert(name.to_string(), string_words);
        }

        let mut spread: Vec<(String, String, f64)> = Vec::new();
        for short in postings.keys() {
            let short_len = short.chars().count();
            for (long, strings) in &postings {
                if long == short || !long.contains(short.as_str()) {
                    continue;
                }
                let ratio = short_len as f64 / long.chars().count() as f64;
                spread.extend(strings.keys().map(|name| (short.clone(), name.clone(), ratio)));
            }
        }
        for (short, name, ratio) in spread {
            if let Some(entries) = postings.get_mut(&short) {
                let score = entries.entry(name).or_insert(0.0);
                *score = score.max(ratio);
            }
        }

        debug!(
            "Built related-string index: {} words over {} strings",
            postings.len(),
            words.len()
        );

        Self { postings, words }
    }

    /// Up to `limit` strings most similar to `name`, best first.
    ///
    /// Equal scores are ordered by string name.
    pub fn query(&self, name: &str, limit: usize) -> Vec<String> {
        let Some(words) = self.words.get(name) else {
            return Vec::new();
        };

        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        for word in words {
            let Some(entries) = self.postings.get(word) else {
                continue;
            };
            for (other, score) in entries {
                if other != name {
                    *scores.entry(other.as_str()).or_insert(0.0) += score;
                }
            }
        }

        let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(other, _)| other.to_string())
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.postings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Word Extraction Tests ====================

    #[test]
    fn test_words_strip_commands_and_short_words() {
        let words = words_of("{RED}Too fast for {STRING} train{P \"\" s}, TRAINS!");
        let expected: BTreeSet<String> = ["fast", "train", "trains"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_words_unicode() {
        let words = words_of("Vitesse trop élevée");
        assert!(words.contains("élevée"));
        assert!(words.contains("vitesse"));
        assert!(!words.contains("trop"));
    }

    // ==================== Query Tests ====================

    #[test]
    fn test_shared_words_rank_highest() {
        let index = RelatedIndex::build([
            ("STR_A", "Station rating dropped"),
            ("STR_B", "Station rating improved"),
            ("STR_C", "Station opened"),
            ("STR_D", "Company bankrupt"),
        ]);
        let related = index.query("STR_A", 5);
        assert_eq!(related, vec!["STR_B", "STR_C"]);
    }

    #[test]
    fn test_no_long_words_gives_nothing() {
        let index = RelatedIndex::build([("STR_A", "{NUM} of {STRING}"), ("STR_B", "Number of cars")]);
        assert!(index.query("STR_A", 5).is_empty());
    }

    #[test]
    fn test_unknown_string_gives_nothing() {
        let index = RelatedIndex::build([("STR_A", "Station")]);
        assert!(index.query("STR_Z", 5).is_empty());
    }

    #[test]
    fn test_substring_words_partially_match() {
        let index = RelatedIndex::build([
            ("STR_ONE", "Train"),
            ("STR_MANY", "Trains"),
            ("STR_OTHER", "Aircraft"),
        ]);
        let related = index.query("STR_ONE", 5);
        assert_eq!(related, vec!["STR_MANY"]);
        // The longer word does not pick up the shorter word's strings
        assert!(index.query("STR_MANY", 5).is_empty());
    }

    #[test]
    fn test_ties_ordered_by_name() {
        let index = RelatedIndex::build([
            ("STR_Q", "Depot"),
            ("STR_C", "Depot"),
            ("STR_A", "Depot"),
            ("STR_B", "Depot"),
        ]);
        assert_eq!(index.query("STR_Q", 5), vec!["STR_A", "STR_B", "STR_C"]);
    }

    #[test]
    fn test_limit_respected() {
        let strings: Vec<(String, &str)> = (0..10).map(|i| (format!("STR_{}", i), "Depot")).collect();
        let index = RelatedIndex::build(strings.iter().map(|(n, t)| (n.as_str(), *t)));
        assert_eq!(index.query("STR_0", 5).len(), 5);
        assert_eq!(index.word_count(), 1);
    }
}
