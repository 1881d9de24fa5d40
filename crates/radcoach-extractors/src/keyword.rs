//! Rule-based keyword extractor.
//!
//! Splits the report into sentences and matches per-type keyword phrases on
//! word boundaries. Every finding in a sentence that contains a negation
//! term is marked negated. Emits at most one candidate per (sentence, type).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use radcoach_core::model::RawCandidate;
use radcoach_core::traits::FindingExtractor;

/// Keyword patterns and negation terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Finding type -> keyword phrases that indicate it.
    #[serde(default = "default_patterns")]
    pub patterns: BTreeMap<String, Vec<String>>,
    /// Phrases that mark a whole sentence as negated.
    #[serde(default = "default_negation_terms")]
    pub negation_terms: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            negation_terms: default_negation_terms(),
        }
    }
}

fn default_patterns() -> BTreeMap<String, Vec<String>> {
    [
        ("pneumonia", &["pneumonia", "consolidation", "infiltrate"][..]),
        ("effusion", &["effusion", "fluid"]),
        ("pneumothorax", &["pneumothorax"]),
        ("cardiomegaly", &["cardiomegaly", "enlarged heart", "cardiac enlargement"]),
        ("edema", &["edema", "pulmonary edema"]),
        ("opacity", &["opacity", "opacities", "opacification"]),
        ("atelectasis", &["atelectasis", "collapse"]),
    ]
    .into_iter()
    .map(|(t, kws)| (t.to_string(), kws.iter().map(|k| k.to_string()).collect()))
    .collect()
}

fn default_negation_terms() -> Vec<String> {
    ["no", "not", "without", "negative", "absent", "clear of", "free of"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Keyword extractor; needs no model and never fails.
pub struct KeywordExtractor {
    name: String,
    /// Finding type and its tokenized keyword phrases.
    patterns: Vec<(String, Vec<Vec<String>>)>,
    negation_terms: Vec<Vec<String>>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new("keyword", &KeywordConfig::default())
    }
}

impl KeywordExtractor {
    pub fn new(name: impl Into<String>, config: &KeywordConfig) -> Self {
        let patterns = config
            .patterns
            .iter()
            .map(|(finding_type, keywords)| {
                let phrases = keywords
                    .iter()
                    .map(|k| tokenize(k))
                    .filter(|p| !p.is_empty())
                    .collect();
                (finding_type.clone(), phrases)
            })
            .collect();
        let negation_terms = config
            .negation_terms
            .iter()
            .map(|t| tokenize(t))
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            name: name.into(),
            patterns,
            negation_terms,
        }
    }

    /// Extract candidates synchronously.
    pub fn candidates(&self, text: &str) -> Vec<RawCandidate> {
        let mut found = Vec::new();

        for sentence in split_sentences(text) {
            let tokens = tokenize(sentence);
            if tokens.is_empty() {
                continue;
            }
            let negated = self
                .negation_terms
                .iter()
                .any(|term| contains_phrase(&tokens, term));

            for (finding_type, phrases) in &self.patterns {
                if phrases.iter().any(|p| contains_phrase(&tokens, p)) {
                    found.push(RawCandidate::new(finding_type.as_str(), sentence, negated));
                }
            }
        }

        found
    }
}

#[async_trait]
impl FindingExtractor for KeywordExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        Ok(self.candidates(text))
    }
}

/// Lowercased alphanumeric words.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && tokens.windows(phrase.len()).any(|w| w == phrase)
}

/// Split on `.`, `?`, `!` and blank lines.
///
/// A single line break is whitespace, so a sentence may wrap. A period
/// between two digits (`1.5 cm`) or inside a dotted abbreviation (`e.g.`,
/// `i.e.`) does not end a sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let char_at = |i: usize| chars.get(i).map(|(_, c)| *c);
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, &(pos, c)) in chars.iter().enumerate() {
        let is_boundary = match c {
            '?' | '!' => true,
            '\n' => chars[i + 1..]
                .iter()
                .map(|(_, n)| *n)
                .find(|n| !matches!(n, ' ' | '\t' | '\r'))
                == Some('\n'),
            '.' => {
                let prev = i.checked_sub(1).and_then(char_at);
                let next = char_at(i + 1);
                let decimal = prev.is_some_and(|p| p.is_ascii_digit())
                    && next.is_some_and(|n| n.is_ascii_digit());
                !decimal && !in_abbreviation(&chars, i)
            }
            _ => false,
        };

        if is_boundary {
            let sentence = text[start..pos].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = pos + c.len_utf8();
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Whether the period at `i` belongs to a letter-dot-letter-dot run such as
/// `e.g.`. A lone capital before a period (`segment B.`) is not one.
fn in_abbreviation(chars: &[(usize, char)], i: usize) -> bool {
    let at = |j: usize| chars.get(j).map(|(_, c)| *c);
    let letter = |j: usize| at(j).is_some_and(char::is_alphabetic);
    let standalone = |j: usize| j == 0 || !at(j - 1).is_some_and(char::is_alphanumeric);

    let opens = i >= 1
        && letter(i - 1)
        && standalone(i - 1)
        && letter(i + 1)
        && at(i + 2) == Some('.');
    let closes = i >= 3
        && letter(i - 1)
        && at(i - 2) == Some('.')
        && letter(i - 3)
        && standalone(i - 3);
    opens || closes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(candidates: &[RawCandidate]) -> Vec<(String, bool)> {
        candidates
            .iter()
            .map(|c| (c.finding_type.clone(), c.negated))
            .collect()
    }

    #[test]
    fn sentence_level_negation() {
        let extractor = KeywordExtractor::default();
        let found = extractor.candidates(
            "There is a focal consolidation in the right lower lobe, consistent with pneumonia. No pneumothorax is seen.",
        );
        assert_eq!(
            summary(&found),
            vec![("pneumonia".into(), false), ("pneumothorax".into(), true)]
        );
        assert_eq!(found[1].context, "No pneumothorax is seen");
    }

    #[test]
    fn negation_terms_match_whole_words_only() {
        let extractor = KeywordExtractor::default();
        let found = extractor.candidates("A nodular opacity is noted. Heart size is normal.");
        assert_eq!(summary(&found), vec![("opacity".into(), false)]);
    }

    #[test]
    fn multi_word_terms() {
        let extractor = KeywordExtractor::default();
        let found = extractor.candidates(
            "Lungs are clear of effusion. Cardiac enlargement is present. Mild pulmonary edema.",
        );
        assert_eq!(
            summary(&found),
            vec![
                ("effusion".into(), true),
                ("cardiomegaly".into(), false),
                ("edema".into(), false),
            ]
        );
    }

    #[test]
    fn one_candidate_per_sentence_and_type() {
        let extractor = KeywordExtractor::default();
        let found = extractor.candidates("Consolidation and infiltrate consistent with pneumonia.");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(KeywordExtractor::default().candidates("   ").is_empty());
    }

    #[test]
    fn custom_patterns() {
        let config = KeywordConfig {
            patterns: BTreeMap::from([("nodule".to_string(), vec!["nodule".to_string()])]),
            negation_terms: vec!["resolved".into()],
        };
        let extractor = KeywordExtractor::new("custom", &config);
        let found = extractor.candidates("Nodule has resolved.\nNew nodule in the apex.");
        assert_eq!(
            summary(&found),
            vec![("nodule".into(), true), ("nodule".into(), false)]
        );
        assert_eq!(extractor.name(), "custom");
    }

    #[test]
    fn sentence_splitting() {
        assert_eq!(
            split_sentences("A 1.5 cm opacity, e.g. a nodule. Next line\n \nThird? Fourth!"),
            vec!["A 1.5 cm opacity, e.g. a nodule", "Next line", "Third", "Fourth"]
        );
    }

    #[test]
    fn single_line_break_does_not_end_sentence() {
        assert_eq!(
            split_sentences("There is no evidence of\npneumothorax."),
            vec!["There is no evidence of\npneumothorax"]
        );

        let found = KeywordExtractor::default().candidates("There is no evidence of\npneumothorax.");
        assert_eq!(summary(&found), vec![("pneumothorax".into(), true)]);
    }

    #[test]
    fn blank_line_ends_sentence() {
        let found = KeywordExtractor::default().candidates("Findings: effusion\n\nNo pneumothorax");
        assert_eq!(
            summary(&found),
            vec![("effusion".into(), false), ("pneumothorax".into(), true)]
        );
    }

    #[test]
    fn single_capital_before_period_ends_sentence() {
        assert_eq!(
            split_sentences("Consolidation in segment B. No effusion. See i.e. the apex."),
            vec!["Consolidation in segment B", "No effusion", "See i.e. the apex"]
        );

        let found = KeywordExtractor::default()
            .candidates("Consolidation in the lateral segment B. No effusion.");
        assert_eq!(
            summary(&found),
            vec![("pneumonia".into(), false), ("effusion".into(), true)]
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: KeywordConfig = toml::from_str(r#"negation_terms = ["no"]"#).unwrap();
        assert_eq!(config.negation_terms, vec!["no"]);
        assert_eq!(config.patterns.len(), 7);
    }

    #[tokio::test]
    async fn extract_through_trait() {
        let extractor = KeywordExtractor::default();
        let found = extractor.extract("Small left effusion.").await.unwrap();
        assert_eq!(summary(&found), vec![("effusion".into(), false)]);
    }
}
