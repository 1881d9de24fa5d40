//! Gold standard assembly.
//!
//! The reference set for a case is the union of the expert-authored labels
//! and the auxiliary image detector's labels. The detector can only assert
//! findings, so the negated set comes from the expert labels alone.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::findings::FindingSet;
use crate::model::{normalize_finding_type, Finding, Polarity};

/// Which source asserted a conflicting finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Expert,
    Auxiliary,
}

/// A finding type that is both asserted and negated in the gold standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolarityConflict {
    pub finding_type: String,
    pub asserted_by: FindingSource,
}

/// The reference finding set for one case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldStandard {
    asserted: BTreeSet<String>,
    negated: BTreeSet<String>,
    expert_asserted: BTreeSet<String>,
}

impl GoldStandard {
    /// Merge expert and auxiliary labels.
    ///
    /// `asserted` is `expert_asserted ∪ auxiliary`; `negated` is
    /// `expert_negated` unchanged. Conflicts are kept as-is and reported
    /// through [`GoldStandard::conflicts`].
    pub fn assemble<A, N, X, S>(expert_asserted: A, expert_negated: N, auxiliary: X) -> Self
    where
        A: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        X: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expert_asserted: BTreeSet<String> = expert_asserted
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let negated = expert_negated
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let mut asserted = expert_asserted.clone();
        asserted.extend(auxiliary.into_iter().map(|s| s.as_ref().to_string()));

        Self {
            asserted,
            negated,
            expert_asserted,
        }
    }

    /// Assemble from serialized expert labels (`-` marks negation) and
    /// auxiliary detector labels.
    ///
    /// Labels are normalized; unparseable labels are skipped with a warning.
    /// A `No Finding` expert label contributes nothing.
    pub fn from_labels<L, S, X, T>(expert_labels: L, auxiliary: X) -> Self
    where
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
        X: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut expert_asserted = Vec::new();
        let mut expert_negated = Vec::new();
        for label in expert_labels {
            match label.as_ref().parse::<Finding>() {
                Ok(f) if f.finding_type == NO_FINDING => {}
                Ok(f) => match f.polarity {
                    Polarity::Asserted => expert_asserted.push(f.finding_type),
                    Polarity::Negated => expert_negated.push(f.finding_type),
                },
                Err(e) => tracing::warn!("skipping expert label: {e}"),
            }
        }
        let auxiliary: Vec<String> = auxiliary
            .into_iter()
            .map(|s| normalize_finding_type(s.as_ref()))
            .filter(|s| !s.is_empty() && s != NO_FINDING)
            .collect();

        Self::assemble(expert_asserted, expert_negated, auxiliary)
    }

    pub fn asserted(&self) -> &BTreeSet<String> {
        &self.asserted
    }

    pub fn negated(&self) -> &BTreeSet<String> {
        &self.negated
    }

    pub fn is_empty(&self) -> bool {
        self.asserted.is_empty() && self.negated.is_empty()
    }

    /// Types present in both polarities, in lexicographic order.
    pub fn conflicts(&self) -> Vec<PolarityConflict> {
        self.asserted
            .intersection(&self.negated)
            .map(|t| PolarityConflict {
                finding_type: t.clone(),
                asserted_by: if self.expert_asserted.contains(t) {
                    FindingSource::Expert
                } else {
                    FindingSource::Auxiliary
                },
            })
            .collect()
    }

    /// The set the learner is compared against, with negated precedence
    /// applied to any conflicts.
    pub fn resolved(&self) -> FindingSet {
        FindingSet::from_types(&self.asserted, &self.negated)
    }

    /// Serialized label form, asserted types first, then `-`-marked negated
    /// types, each group in lexicographic order.
    pub fn to_labels(&self) -> Vec<String> {
        self.asserted
            .iter()
            .map(|t| Finding::asserted(t.as_str()).to_string())
            .chain(
                self.negated
                    .iter()
                    .map(|t| Finding::negated(t.as_str()).to_string()),
            )
            .collect()
    }
}

/// Normalized form of the `No Finding` label.
pub const NO_FINDING: &str = "nofinding";
