//! Finding set construction.
//!
//! Collapses raw extractor candidates into two disjoint sets of finding
//! types. When a type is mentioned both negated and unnegated, the negated
//! classification wins.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Finding, Polarity, RawCandidate};

/// Asserted and negated finding types from a single source.
///
/// A type is never present in both sets; every mutation goes through
/// [`FindingSet::insert`], which applies negated precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFindingSet")]
pub struct FindingSet {
    asserted: BTreeSet<String>,
    negated: BTreeSet<String>,
}

/// Unchecked wire shape, funneled through the builder on deserialization.
#[derive(Deserialize)]
struct RawFindingSet {
    #[serde(default)]
    asserted: BTreeSet<String>,
    #[serde(default)]
    negated: BTreeSet<String>,
}

impl From<RawFindingSet> for FindingSet {
    fn from(raw: RawFindingSet) -> Self {
        FindingSet::from_types(raw.asserted, raw.negated)
    }
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from extractor candidates.
    pub fn from_candidates<'a, I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a RawCandidate>,
    {
        let mut set = Self::new();
        for candidate in candidates {
            set.insert(&candidate.finding_type, candidate.negated);
        }
        set
    }

    /// Build a set from explicit type lists.
    pub fn from_types<A, N, S, T>(asserted: A, negated: N) -> Self
    where
        A: IntoIterator<Item = S>,
        N: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut set = Self::new();
        for t in asserted {
            set.insert(t.as_ref(), false);
        }
        for t in negated {
            set.insert(t.as_ref(), true);
        }
        set
    }

    /// Record one mention of `finding_type`.
    ///
    /// A negated mention moves the type out of `asserted`; an unnegated
    /// mention of an already negated type is ignored.
    pub fn insert(&mut self, finding_type: &str, negated: bool) {
        if negated {
            self.asserted.remove(finding_type);
            self.negated.insert(finding_type.to_string());
        } else if !self.negated.contains(finding_type) {
            self.asserted.insert(finding_type.to_string());
        }
    }

    /// Fold another source into this one under the same precedence rule.
    pub fn merge(&mut self, other: &FindingSet) {
        for t in &other.asserted {
            self.insert(t, false);
        }
        for t in &other.negated {
            self.insert(t, true);
        }
    }

    pub fn asserted(&self) -> &BTreeSet<String> {
        &self.asserted
    }

    pub fn negated(&self) -> &BTreeSet<String> {
        &self.negated
    }

    pub fn polarity_of(&self, finding_type: &str) -> Option<Polarity> {
        if self.negated.contains(finding_type) {
            Some(Polarity::Negated)
        } else if self.asserted.contains(finding_type) {
            Some(Polarity::Asserted)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.asserted.is_empty() && self.negated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.asserted.len() + self.negated.len()
    }

    /// All findings, asserted first, each group in lexicographic order.
    pub fn findings(&self) -> impl Iterator<Item = Finding> + '_ {
        self.asserted
            .iter()
            .map(Finding::asserted)
            .chain(self.negated.iter().map(Finding::negated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(t: &str, negated: bool) -> RawCandidate {
        RawCandidate::new(t, "", negated)
    }

    #[test]
    fn empty_input_yields_empty_sets() {
        let set = FindingSet::from_candidates(&Vec::<RawCandidate>::new());
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn duplicates_collapse() {
        let candidates = vec![
            candidate("effusion", false),
            candidate("effusion", false),
            candidate("pneumonia", true),
            candidate("pneumonia", true),
        ];
        let set = FindingSet::from_candidates(&candidates);
        assert_eq!(set.asserted().len(), 1);
        assert_eq!(set.negated().len(), 1);
    }

    #[test]
    fn negated_mention_takes_precedence_in_either_order() {
        let first_negated = vec![candidate("edema", true), candidate("edema", false)];
        let last_negated = vec![candidate("edema", false), candidate("edema", true)];

        for candidates in [first_negated, last_negated] {
            let set = FindingSet::from_candidates(&candidates);
            assert!(set.asserted().is_empty());
            assert_eq!(set.polarity_of("edema"), Some(Polarity::Negated));
        }
    }

    #[test]
    fn merge_applies_precedence_across_sources() {
        let mut a = FindingSet::from_types(["effusion", "pneumonia"], Vec::<&str>::new());
        let b = FindingSet::from_types(["cardiomegaly"], ["pneumonia"]);
        a.merge(&b);

        assert_eq!(
            a.asserted().iter().collect::<Vec<_>>(),
            vec!["cardiomegaly", "effusion"]
        );
        assert_eq!(a.negated().iter().collect::<Vec<_>>(), vec!["pneumonia"]);
    }

    #[test]
    fn findings_iterate_in_stable_order() {
        let set = FindingSet::from_types(["opacity", "edema"], ["pneumothorax"]);
        let labels: Vec<String> = set.findings().map(|f| f.to_string()).collect();
        assert_eq!(labels, vec!["edema", "opacity", "-pneumothorax"]);
    }

    #[test]
    fn deserialization_restores_disjointness() {
        let json = r#"{"asserted": ["edema", "effusion"], "negated": ["edema"]}"#;
        let set: FindingSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.asserted().iter().collect::<Vec<_>>(), vec!["effusion"]);
        assert_eq!(set.polarity_of("edema"), Some(Polarity::Negated));
    }
}
