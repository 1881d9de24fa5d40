//! Aggregate statistics over a batch of analyses.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::report::AnalysisReport;

/// How many entries the frequency tables keep.
pub const TOP_FINDINGS: usize = 5;

/// Aggregate statistics across all analyses in a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub analyzed: usize,
    pub mean_score: f64,
    pub min_score: u32,
    pub max_score: u32,
    /// Analyses that scored 100.
    pub perfect_count: usize,
    /// Per-case statistics.
    pub per_case: BTreeMap<String, CaseStats>,
    /// Gold findings learners most often missed.
    pub most_missed: Vec<FindingFrequency>,
    /// Learner findings most often unsupported or negation errors.
    pub most_misinterpreted: Vec<FindingFrequency>,
}

/// Statistics for a single case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStats {
    pub case_id: String,
    pub analyses: usize,
    pub mean_score: f64,
    pub style_advisories: usize,
}

/// A finding type and how many analyses it appeared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingFrequency {
    pub finding_type: String,
    pub count: usize,
}

/// Compute aggregate statistics from all analyses.
pub fn compute_aggregate_stats(analyses: &[AnalysisReport]) -> AggregateStats {
    if analyses.is_empty() {
        return AggregateStats::default();
    }

    let scores: Vec<u32> = analyses.iter().map(|a| a.feedback.overall_score).collect();
    let mean_score = mean(&scores);

    let mut by_case: HashMap<&str, Vec<&AnalysisReport>> = HashMap::new();
    for a in analyses {
        by_case.entry(a.case_id.as_str()).or_default().push(a);
    }

    let per_case = by_case
        .into_iter()
        .map(|(case_id, group)| {
            let scores: Vec<u32> = group.iter().map(|a| a.feedback.overall_score).collect();
            let style_advisories = group.iter().map(|a| a.feedback.clarity_and_style.len()).sum();
            (
                case_id.to_string(),
                CaseStats {
                    case_id: case_id.to_string(),
                    analyses: group.len(),
                    mean_score: mean(&scores),
                    style_advisories,
                },
            )
        })
        .collect();

    let most_missed = top_frequencies(analyses.iter().flat_map(|a| {
        a.comparison
            .missed
            .iter()
            .chain(&a.comparison.missed_negations)
    }));
    let most_misinterpreted = top_frequencies(analyses.iter().flat_map(|a| {
        a.comparison
            .misinterpreted
            .iter()
            .chain(&a.comparison.negation_errors)
    }));

    AggregateStats {
        analyzed: analyses.len(),
        mean_score,
        min_score: scores.iter().copied().min().unwrap_or(0),
        max_score: scores.iter().copied().max().unwrap_or(0),
        perfect_count: scores.iter().filter(|s| **s == 100).count(),
        per_case,
        most_missed,
        most_misinterpreted,
    }
}

fn mean(scores: &[u32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64
}

/// Count occurrences, highest first, ties broken by type name.
fn top_frequencies<'a>(types: impl Iterator<Item = &'a String>) -> Vec<FindingFrequency> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in types {
        *counts.entry(t.as_str()).or_default() += 1;
    }
    let mut freqs: Vec<FindingFrequency> = counts
        .into_iter()
        .map(|(t, count)| FindingFrequency {
            finding_type: t.to_string(),
            count,
        })
        .collect();
    freqs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.finding_type.cmp(&b.finding_type)));
    freqs.truncate(TOP_FINDINGS);
    freqs
}
