//! Report style checks.
//!
//! Flags hedging or unprofessional phrasing and reports that are too short
//! or too long. Independent of any finding set.

use serde::{Deserialize, Serialize};

/// Phrases flagged by default, in evaluation order.
pub const DEFAULT_FLAGGED_PHRASES: &[&str] =
    &["i think", "looks like", "maybe a", "stuff", "bad finding"];

/// Static configuration of the style checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRules {
    /// Case-insensitive phrases that each raise one advisory.
    #[serde(default = "default_flagged_phrases")]
    pub flagged_phrases: Vec<String>,
    /// Reports with fewer words than this are too brief.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    /// Reports with more words than this are too verbose.
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_flagged_phrases() -> Vec<String> {
    DEFAULT_FLAGGED_PHRASES.iter().map(|p| p.to_string()).collect()
}

fn default_min_words() -> usize {
    15
}

fn default_max_words() -> usize {
    100
}

impl Default for StyleRules {
    fn default() -> Self {
        Self {
            flagged_phrases: default_flagged_phrases(),
            min_words: default_min_words(),
            max_words: default_max_words(),
        }
    }
}

pub const BRIEF_ADVISORY: &str =
    "The report is very brief. Ensure all relevant positive and negative findings are documented.";
pub const VERBOSE_ADVISORY: &str =
    "The report is quite long. Strive for clarity and conciseness, especially in the impression.";

/// Applies [`StyleRules`] to report text.
#[derive(Debug, Clone)]
pub struct StyleCritic {
    rules: StyleRules,
    lowered_phrases: Vec<String>,
}

impl Default for StyleCritic {
    fn default() -> Self {
        Self::new(StyleRules::default())
    }
}

impl StyleCritic {
    pub fn new(rules: StyleRules) -> Self {
        let lowered_phrases = rules
            .flagged_phrases
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        Self {
            rules,
            lowered_phrases,
        }
    }

    pub fn rules(&self) -> &StyleRules {
        &self.rules
    }

    /// Review `text`, returning advisories in rule order: phrase checks in
    /// list order, then the length check.
    pub fn review(&self, text: &str) -> Vec<String> {
        let mut advisories = Vec::new();
        let lowered = text.to_lowercase();

        for (phrase, needle) in self.rules.flagged_phrases.iter().zip(&self.lowered_phrases) {
            if !needle.is_empty() && lowered.contains(needle.as_str()) {
                advisories.push(format!(
                    "The phrase '{phrase}' is unprofessional. Aim for objective, confident language (e.g., 'consistent with' or 'suggestive of')."
                ));
            }
        }

        let words = word_count(text);
        if words < self.rules.min_words {
            advisories.push(BRIEF_ADVISORY.to_string());
        } else if words > self.rules.max_words {
            advisories.push(VERBOSE_ADVISORY.to_string());
        }

        advisories
    }
}

/// Number of whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
