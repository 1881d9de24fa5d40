//! Core data model types for radcoach.
//!
//! These are the fundamental types the whole system uses to represent
//! findings, extractor candidates, cases and case libraries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Leading marker of a negated finding in the serialized label form.
pub const NEGATION_MARKER: char = '-';

/// Whether a finding is stated as present or as explicitly absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Asserted,
    Negated,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Asserted => write!(f, "asserted"),
            Polarity::Negated => write!(f, "negated"),
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asserted" | "present" | "positive" => Ok(Polarity::Asserted),
            "negated" | "absent" | "negative" => Ok(Polarity::Negated),
            other => Err(format!("unknown polarity: {other}")),
        }
    }
}

/// A normalized (type, polarity) atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    /// Normalized lowercase condition name (e.g. "effusion").
    #[serde(rename = "type")]
    pub finding_type: String,
    pub polarity: Polarity,
}

impl Finding {
    pub fn asserted(finding_type: impl Into<String>) -> Self {
        Self {
            finding_type: finding_type.into(),
            polarity: Polarity::Asserted,
        }
    }

    pub fn negated(finding_type: impl Into<String>) -> Self {
        Self {
            finding_type: finding_type.into(),
            polarity: Polarity::Negated,
        }
    }

    pub fn is_negated(&self) -> bool {
        self.polarity == Polarity::Negated
    }
}

/// Serialized label form: negated findings carry a leading `-`.
impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.polarity {
            Polarity::Asserted => write!(f, "{}", self.finding_type),
            Polarity::Negated => write!(f, "{NEGATION_MARKER}{}", self.finding_type),
        }
    }
}

impl FromStr for Finding {
    type Err = String;

    /// Parse a serialized label, normalizing the finding type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (polarity, rest) = match trimmed.strip_prefix(NEGATION_MARKER) {
            Some(rest) => (Polarity::Negated, rest),
            None => (Polarity::Asserted, trimmed),
        };
        let finding_type = normalize_finding_type(rest);
        if finding_type.is_empty() {
            return Err(format!("empty finding label: '{s}'"));
        }
        Ok(Finding {
            finding_type,
            polarity,
        })
    }
}

/// Normalize a raw label into the finding-type vocabulary.
///
/// Lowercases and drops underscores and whitespace, so `Pleural_Effusion`
/// and `pleural effusion` both become `pleuraleffusion`.
pub fn normalize_finding_type(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One unprocessed mention produced by an upstream text extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Finding type the mention maps to.
    #[serde(rename = "type")]
    pub finding_type: String,
    /// Sentence or context the mention came from.
    #[serde(default, alias = "text")]
    pub context: String,
    /// Whether the mention occurred in a negated context.
    #[serde(default)]
    pub negated: bool,
}

impl RawCandidate {
    pub fn new(finding_type: impl Into<String>, context: impl Into<String>, negated: bool) -> Self {
        Self {
            finding_type: finding_type.into(),
            context: context.into(),
            negated,
        }
    }
}

/// A single teaching case the learner writes a report for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier (usually the image file stem).
    pub id: String,
    /// Short demographic line shown to the learner.
    #[serde(default)]
    pub patient_info: String,
    /// Clinical history.
    #[serde(default)]
    pub history: String,
    /// Path of the study image, if any.
    #[serde(default)]
    pub image_path: Option<String>,
    /// Expert-authored labels in serialized form (`-` marks negation).
    #[serde(default)]
    pub expert_findings: Vec<String>,
    /// Precomputed output of the auxiliary image detector.
    #[serde(default)]
    pub auxiliary_findings: Vec<String>,
    /// A pre-written learner report used for demos and batch runs.
    #[serde(default)]
    pub sample_report: Option<String>,
}

/// A collection of cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseLibrary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cases: Vec<Case>,
}

impl CaseLibrary {
    /// Look up a case by ID. A file name such as `00000061_015.png`
    /// resolves to the case `00000061_015`.
    pub fn get(&self, case_id: &str) -> Option<&Case> {
        let base = case_id.trim();
        self.cases
            .iter()
            .find(|c| c.id == base)
            .or_else(|| {
                let stem = base.split('.').next().unwrap_or(base);
                self.cases.iter().find(|c| c.id == stem)
            })
    }

    /// One submission per case that carries a non-empty sample report.
    pub fn sample_submissions(&self) -> Vec<Submission> {
        self.cases
            .iter()
            .filter_map(|c| {
                let text = c.sample_report.as_deref()?.trim();
                (!text.is_empty()).then(|| Submission {
                    case_id: c.id.clone(),
                    report_text: text.to_string(),
                })
            })
            .collect()
    }
}

/// A learner report submitted for one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub case_id: String,
    pub report_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_display_and_parse() {
        assert_eq!(Polarity::Asserted.to_string(), "asserted");
        assert_eq!("Negated".parse::<Polarity>().unwrap(), Polarity::Negated);
        assert_eq!("absent".parse::<Polarity>().unwrap(), Polarity::Negated);
        assert!("maybe".parse::<Polarity>().is_err());
    }

    #[test]
    fn finding_label_roundtrip() {
        let f: Finding = "-Pneumothorax".parse().unwrap();
        assert_eq!(f, Finding::negated("pneumothorax"));
        assert_eq!(f.to_string(), "-pneumothorax");

        let f: Finding = " Pleural_Effusion ".parse().unwrap();
        assert_eq!(f, Finding::asserted("pleuraleffusion"));
        assert!("-".parse::<Finding>().is_err());
    }

    #[test]
    fn normalize_strips_case_and_separators() {
        assert_eq!(normalize_finding_type("No Finding"), "nofinding");
        assert_eq!(normalize_finding_type("Pleural_Thickening"), "pleuralthickening");
        assert_eq!(normalize_finding_type("effusion"), "effusion");
    }

    #[test]
    fn raw_candidate_accepts_text_alias() {
        let json = r#"{"type": "effusion", "text": "small effusion", "negated": false}"#;
        let c: RawCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.context, "small effusion");
        assert!(!c.negated);
    }

    #[test]
    fn library_lookup_accepts_file_name() {
        let library = CaseLibrary {
            id: "lib".into(),
            name: "Lib".into(),
            description: String::new(),
            cases: vec![Case {
                id: "00000061_015".into(),
                patient_info: String::new(),
                history: String::new(),
                image_path: None,
                expert_findings: vec![],
                auxiliary_findings: vec![],
                sample_report: None,
            }],
        };
        assert!(library.get("00000061_015").is_some());
        assert!(library.get("00000061_015.png").is_some());
        assert!(library.get("00000061_016").is_none());
    }

    #[test]
    fn sample_submissions_skip_missing_and_blank_reports() {
        let case = |id: &str, report: Option<&str>| Case {
            id: id.into(),
            patient_info: String::new(),
            history: String::new(),
            image_path: None,
            expert_findings: vec![],
            auxiliary_findings: vec![],
            sample_report: report.map(String::from),
        };
        let library = CaseLibrary {
            id: "lib".into(),
            name: "Lib".into(),
            description: String::new(),
            cases: vec![case("a", Some(" Clear lungs. ")), case("b", None), case("c", Some("  "))],
        };
        let submissions = library.sample_submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].case_id, "a");
        assert_eq!(submissions[0].report_text, "Clear lungs.");
    }
}
