//! Learner-vs-gold reconciliation and scoring.
//!
//! Everything here is plain set algebra over finding types. The learner-side
//! categories (correct, missed, misinterpreted) are pairwise disjoint on base
//! types: a finding asserted by the learner but marked absent by the gold
//! standard is a negation error and nothing else.

use serde::{Deserialize, Serialize};

use crate::findings::FindingSet;
use crate::gold::{FindingSource, GoldStandard};
use crate::report::{Diagnostic, DiagnosticKind, FeedbackRecord};
use crate::style::StyleCritic;

/// Pedagogical reminders attached to every feedback record.
pub const GENERAL_TIPS: &[&str] = &[
    "Always conclude with a concise 'Impression' section summarizing the most critical findings.",
    "When describing a finding, try to mention its location (e.g., 'right lower lobe').",
];

/// Maximum (and starting) score.
pub const MAX_SCORE: u32 = 100;

/// Per-item score penalties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Gold finding the learner did not report.
    #[serde(default = "default_missed_finding")]
    pub missed_finding: u32,
    /// Expected negative the learner did not state.
    #[serde(default = "default_missed_negation")]
    pub missed_negation: u32,
    /// Learner finding the gold standard does not support.
    #[serde(default = "default_misinterpretation")]
    pub misinterpretation: u32,
    /// Learner finding the gold standard marks absent.
    #[serde(default = "default_negation_error")]
    pub negation_error: u32,
    /// Each style advisory.
    #[serde(default = "default_style_advisory")]
    pub style_advisory: u32,
}

fn default_missed_finding() -> u32 {
    15
}
fn default_missed_negation() -> u32 {
    5
}
fn default_misinterpretation() -> u32 {
    20
}
fn default_negation_error() -> u32 {
    25
}
fn default_style_advisory() -> u32 {
    5
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            missed_finding: default_missed_finding(),
            missed_negation: default_missed_negation(),
            misinterpretation: default_misinterpretation(),
            negation_error: default_negation_error(),
            style_advisory: default_style_advisory(),
        }
    }
}

impl ScoreWeights {
    /// Score a comparison, clamped to `0..=100`.
    pub fn score(&self, comparison: &Comparison, style_advisories: usize) -> u32 {
        let penalty = |count: usize, weight: u32| count as i64 * weight as i64;
        let total = MAX_SCORE as i64
            - penalty(comparison.missed.len(), self.missed_finding)
            - penalty(comparison.missed_negations.len(), self.missed_negation)
            - penalty(comparison.misinterpreted.len(), self.misinterpretation)
            - penalty(comparison.negation_errors.len(), self.negation_error)
            - penalty(style_advisories, self.style_advisory);
        total.clamp(0, MAX_SCORE as i64) as u32
    }
}

/// Typed outcome of comparing a learner set with a gold set.
///
/// Every list holds base finding types in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Asserted by both.
    pub correct: Vec<String>,
    /// Negated by both.
    pub correct_negations: Vec<String>,
    /// Asserted by the gold standard only.
    pub missed: Vec<String>,
    /// Negated by the gold standard, not mentioned by the learner.
    pub missed_negations: Vec<String>,
    /// Asserted by the learner, not mentioned by the gold standard.
    pub misinterpreted: Vec<String>,
    /// Asserted by the learner, negated by the gold standard.
    pub negation_errors: Vec<String>,
}

impl Comparison {
    /// Compare two disjoint finding sets.
    pub fn between(learner: &FindingSet, gold: &FindingSet) -> Self {
        let (la, ln) = (learner.asserted(), learner.negated());
        let (ga, gn) = (gold.asserted(), gold.negated());

        Self {
            correct: la.intersection(ga).cloned().collect(),
            correct_negations: ln.intersection(gn).cloned().collect(),
            missed: ga.difference(la).cloned().collect(),
            missed_negations: gn
                .difference(ln)
                .filter(|t| !la.contains(*t))
                .cloned()
                .collect(),
            misinterpreted: la
                .difference(ga)
                .filter(|t| !gn.contains(*t))
                .cloned()
                .collect(),
            negation_errors: la.intersection(gn).cloned().collect(),
        }
    }

    /// Correct types followed by "absence of X" entries.
    pub fn correct_observations(&self) -> Vec<String> {
        self.correct
            .iter()
            .cloned()
            .chain(self.correct_negations.iter().map(|t| format!("absence of {t}")))
            .collect()
    }

    /// Missed types followed by "missed stating absence of X" entries.
    pub fn missed_findings(&self) -> Vec<String> {
        self.missed
            .iter()
            .cloned()
            .chain(
                self.missed_negations
                    .iter()
                    .map(|t| format!("missed stating absence of {t}")),
            )
            .collect()
    }

    /// Unsupported types followed by negation-error entries.
    pub fn misinterpretations(&self) -> Vec<String> {
        self.misinterpreted
            .iter()
            .cloned()
            .chain(
                self.negation_errors
                    .iter()
                    .map(|t| format!("incorrectly asserted {t} (should be absent)")),
            )
            .collect()
    }

    /// True when nothing was missed or misinterpreted.
    pub fn is_exact_match(&self) -> bool {
        self.missed.is_empty()
            && self.missed_negations.is_empty()
            && self.misinterpreted.is_empty()
            && self.negation_errors.is_empty()
    }
}

/// The reconciliation engine: compares, critiques and scores.
///
/// Stateless between calls; one instance can serve any number of analyses.
#[derive(Debug, Clone)]
pub struct Reconciler {
    critic: StyleCritic,
    weights: ScoreWeights,
    tips: Vec<String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(StyleCritic::default(), ScoreWeights::default())
    }
}

impl Reconciler {
    pub fn new(critic: StyleCritic, weights: ScoreWeights) -> Self {
        Self {
            critic,
            weights,
            tips: GENERAL_TIPS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_tips(mut self, tips: Vec<String>) -> Self {
        self.tips = tips;
        self
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Compare learner findings against the resolved gold standard.
    pub fn compare(&self, learner: &FindingSet, gold: &GoldStandard) -> Comparison {
        Comparison::between(learner, &gold.resolved())
    }

    /// Build the feedback record for an already computed comparison.
    pub fn feedback(
        &self,
        comparison: &Comparison,
        gold: &GoldStandard,
        report_text: &str,
    ) -> FeedbackRecord {
        let clarity_and_style = self.critic.review(report_text);
        let overall_score = self.weights.score(comparison, clarity_and_style.len());

        let diagnostics = gold
            .conflicts()
            .into_iter()
            .map(|c| {
                let source = match c.asserted_by {
                    FindingSource::Expert => "expert labels",
                    FindingSource::Auxiliary => "auxiliary detector",
                };
                Diagnostic {
                    kind: DiagnosticKind::GoldPolarityConflict,
                    finding_type: Some(c.finding_type.clone()),
                    message: format!(
                        "gold standard lists '{}' as present ({source}) and absent; scored as absent",
                        c.finding_type
                    ),
                }
            })
            .collect();

        FeedbackRecord {
            correct_observations: comparison.correct_observations(),
            missed_findings: comparison.missed_findings(),
            misinterpretations: comparison.misinterpretations(),
            clarity_and_style,
            tips: self.tips.clone(),
            overall_score,
            diagnostics,
        }
    }

    /// Compare, critique and score in one step.
    pub fn reconcile(
        &self,
        learner: &FindingSet,
        gold: &GoldStandard,
        report_text: &str,
    ) -> FeedbackRecord {
        let comparison = self.compare(learner, gold);
        self.feedback(&comparison, gold, report_text)
    }
}
