//! Feedback and analysis report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::findings::FindingSet;
use crate::model::RawCandidate;
use crate::reconcile::Comparison;
use crate::statistics::AggregateStats;

/// The categorized feedback returned for one learner report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub correct_observations: Vec<String>,
    pub missed_findings: Vec<String>,
    pub misinterpretations: Vec<String>,
    pub clarity_and_style: Vec<String>,
    pub tips: Vec<String>,
    /// Integer score in `0..=100`.
    pub overall_score: u32,
    /// Data-quality and extractor-failure notes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Kind of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    GoldPolarityConflict,
    ExtractorFailed,
    DetectorFailed,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::GoldPolarityConflict => write!(f, "gold_polarity_conflict"),
            DiagnosticKind::ExtractorFailed => write!(f, "extractor_failed"),
            DiagnosticKind::DetectorFailed => write!(f, "detector_failed"),
        }
    }
}

/// A note about input quality or a failed collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_type: Option<String>,
    pub message: String,
}

impl FeedbackRecord {
    /// Format the feedback as markdown, one section per category.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("**Overall score:** {}/100\n\n", self.overall_score);

        let sections: [(&str, &[String]); 5] = [
            ("Correct observations", &self.correct_observations),
            ("Missed findings", &self.missed_findings),
            ("Misinterpretations", &self.misinterpretations),
            ("Clarity and style", &self.clarity_and_style),
            ("Tips", &self.tips),
        ];
        for (title, items) in sections {
            md.push_str(&format!("### {title}\n\n"));
            if items.is_empty() {
                md.push_str("_None._\n");
            }
            for item in items {
                md.push_str(&format!("- {item}\n"));
            }
            md.push('\n');
        }

        if !self.diagnostics.is_empty() {
            md.push_str("### Diagnostics\n\n");
            for d in &self.diagnostics {
                md.push_str(&format!("- `{}`: {}\n", d.kind, d.message));
            }
            md.push('\n');
        }

        md
    }
}

/// Outcome of one extractor call inside an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorRun {
    pub extractor: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub candidates: Vec<RawCandidate>,
    /// Number of calls made, including retries.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// One complete analysis of a learner report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub case_id: String,
    /// Gold standard in serialized label form.
    pub gold_standard: Vec<String>,
    pub learner_findings: FindingSet,
    #[serde(default)]
    pub extractor_runs: Vec<ExtractorRun>,
    pub comparison: Comparison,
    pub feedback: FeedbackRecord,
    pub processing_time_ms: u64,
}

/// Summary of a case library (without the full case definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub id: String,
    pub name: String,
    pub case_count: usize,
}

/// A submission that could not be analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub case_id: String,
    pub error: String,
}

/// A run of many analyses over one case library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub library: LibrarySummary,
    pub analyses: Vec<AnalysisReport>,
    #[serde(default)]
    pub failures: Vec<BatchFailure>,
    pub aggregate: AggregateStats,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl BatchReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Format the batch as markdown: a summary table, then per-case feedback.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# {}\n\n", self.library.name);

        md.push_str(&format!(
            "**Summary:** {} analyzed, {} failed, mean score {:.1}\n\n",
            self.analyses.len(),
            self.failures.len(),
            self.aggregate.mean_score
        ));

        if !self.analyses.is_empty() {
            md.push_str("| Case | Score | Missed | Misinterpreted | Style |\n");
            md.push_str("|------|-------|--------|----------------|-------|\n");
            for a in &self.analyses {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    a.case_id,
                    a.feedback.overall_score,
                    a.feedback.missed_findings.len(),
                    a.feedback.misinterpretations.len(),
                    a.feedback.clarity_and_style.len()
                ));
            }
            md.push('\n');
        }

        if !self.failures.is_empty() {
            md.push_str("### Failures\n\n");
            for f in &self.failures {
                md.push_str(&format!("- {}: {}\n", f.case_id, f.error));
            }
            md.push('\n');
        }

        for a in &self.analyses {
            md.push_str(&format!("## {}\n\n", a.case_id));
            md.push_str(&a.feedback.to_markdown());
        }

        md
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content).context("failed to parse report JSON")
}
