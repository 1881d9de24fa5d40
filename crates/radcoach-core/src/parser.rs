//! TOML case library parser.
//!
//! Loads case libraries from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::gold::{GoldStandard, NO_FINDING};
use crate::model::{normalize_finding_type, Case, CaseLibrary, Finding};

/// Intermediate TOML structure for parsing case library files.
#[derive(Debug, Deserialize)]
struct TomlLibraryFile {
    library: TomlLibraryHeader,
    #[serde(default)]
    cases: Vec<TomlCase>,
}

#[derive(Debug, Deserialize)]
struct TomlLibraryHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlCase {
    id: String,
    #[serde(default)]
    patient_info: String,
    #[serde(default)]
    history: String,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    expert_findings: Vec<String>,
    #[serde(default)]
    auxiliary_findings: Vec<String>,
    #[serde(default)]
    sample_report: Option<String>,
}

/// Parse a single TOML file into a `CaseLibrary`.
pub fn parse_case_library(path: &Path) -> Result<CaseLibrary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read case library file: {}", path.display()))?;

    parse_case_library_str(&content, path)
}

/// Parse a TOML string into a `CaseLibrary`.
///
/// Case IDs are trimmed; expert labels keep their serialized form and are
/// normalized later by [`GoldStandard::from_labels`].
pub fn parse_case_library_str(content: &str, source_path: &Path) -> Result<CaseLibrary> {
    let parsed: TomlLibraryFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let cases = parsed
        .cases
        .into_iter()
        .map(|c| {
            let id = c.id.trim().to_string();
            if id.is_empty() {
                anyhow::bail!("case with empty id in {}", source_path.display());
            }
            Ok(Case {
                id,
                patient_info: c.patient_info,
                history: c.history,
                image_path: c.image_path.filter(|p| !p.trim().is_empty()),
                expert_findings: c.expert_findings,
                auxiliary_findings: c.auxiliary_findings,
                sample_report: c.sample_report,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CaseLibrary {
        id: parsed.library.id,
        name: parsed.library.name,
        description: parsed.library.description,
        cases,
    })
}

/// Recursively load all `.toml` case library files from a directory.
pub fn load_case_directory(dir: &Path) -> Result<Vec<CaseLibrary>> {
    let mut libraries = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            libraries.extend(load_case_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_case_library(&path) {
                Ok(library) => libraries.push(library),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(libraries)
}

/// Load a single file, or every library in a directory.
pub fn load_case_libraries(path: &Path) -> Result<Vec<CaseLibrary>> {
    if path.is_dir() {
        load_case_directory(path)
    } else {
        Ok(vec![parse_case_library(path)?])
    }
}

/// A warning from case library validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The case ID (if applicable).
    pub case_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a case library for common data-quality issues.
pub fn validate_case_library(library: &CaseLibrary) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |case: &Case, message: String| {
        warnings.push(ValidationWarning {
            case_id: Some(case.id.clone()),
            message,
        })
    };

    let mut seen_ids = HashSet::new();
    for case in &library.cases {
        if !seen_ids.insert(&case.id) {
            warn(case, format!("duplicate case ID: {}", case.id));
        }
    }

    for case in &library.cases {
        for label in &case.expert_findings {
            if label.parse::<Finding>().is_err() {
                warn(case, format!("unparseable expert label: '{label}'"));
            }
        }

        let gold = GoldStandard::from_labels(&case.expert_findings, &case.auxiliary_findings);
        let expert_only = GoldStandard::from_labels(&case.expert_findings, Vec::<String>::new());
        for conflict in expert_only.conflicts() {
            warn(
                case,
                format!(
                    "expert labels mark '{}' both present and absent",
                    conflict.finding_type
                ),
            );
        }

        let has_no_finding = case
            .expert_findings
            .iter()
            .any(|l| normalize_finding_type(l) == NO_FINDING);
        if has_no_finding && !expert_only.asserted().is_empty() {
            warn(case, "'No Finding' is listed alongside positive findings".into());
        }

        if gold.is_empty() && !has_no_finding {
            warn(case, "gold standard is empty".into());
        }

        if case
            .sample_report
            .as_ref()
            .is_some_and(|r| r.trim().is_empty())
        {
            warn(case, "sample_report is empty".into());
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[library]
id = "nih-sample"
name = "NIH sample"
description = "Chest x-ray teaching cases"

[[cases]]
id = "00000061_015"
patient_info = "61 year old M"
history = "Shortness of breath"
image_path = "static/images/00000061_015.png"
expert_findings = ["Pneumonia", "-pneumothorax"]
auxiliary_findings = ["visual_anomaly"]
sample_report = """
There is a focal consolidation in the right lower lobe, consistent with
pneumonia. No pneumothorax is seen.
"""
"#;

    fn parse(toml: &str) -> CaseLibrary {
        parse_case_library_str(toml, &PathBuf::from("test.toml")).unwrap()
    }

    #[test]
    fn parse_valid_toml() {
        let library = parse(VALID_TOML);
        assert_eq!(library.id, "nih-sample");
        assert_eq!(library.cases.len(), 1);

        let case = &library.cases[0];
        assert_eq!(case.id, "00000061_015");
        assert_eq!(case.expert_findings, vec!["Pneumonia", "-pneumothorax"]);
        assert_eq!(case.auxiliary_findings, vec!["visual_anomaly"]);
        assert!(case.sample_report.as_deref().unwrap().contains("No pneumothorax"));
        assert!(validate_case_library(&library).is_empty());
    }

    #[test]
    fn parse_missing_optional_fields() {
        let library = parse(
            r#"
[library]
id = "minimal"
name = "Minimal"

[[cases]]
id = " case1 "
expert_findings = ["effusion"]
"#,
        );
        let case = &library.cases[0];
        assert_eq!(case.id, "case1");
        assert!(case.image_path.is_none());
        assert!(case.sample_report.is_none());
        assert!(case.auxiliary_findings.is_empty());
    }

    #[test]
    fn empty_case_id_is_an_error() {
        let toml = r#"
[library]
id = "x"
name = "X"

[[cases]]
id = "  "
"#;
        assert!(parse_case_library_str(toml, &PathBuf::from("x.toml")).is_err());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_case_library_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_data_quality_issues() {
        let library = parse(
            r#"
[library]
id = "dirty"
name = "Dirty"

[[cases]]
id = "same"
expert_findings = ["edema", "-edema"]

[[cases]]
id = "same"
expert_findings = ["No Finding", "effusion"]

[[cases]]
id = "blank"
sample_report = "  "
"#,
        );
        let messages: Vec<String> = validate_case_library(&library)
            .into_iter()
            .map(|w| w.message)
            .collect();

        assert!(messages.iter().any(|m| m.contains("duplicate case ID")));
        assert!(messages.iter().any(|m| m.contains("'edema' both present and absent")));
        assert!(messages.iter().any(|m| m.contains("'No Finding'")));
        assert!(messages.iter().any(|m| m.contains("gold standard is empty")));
        assert!(messages.iter().any(|m| m.contains("sample_report is empty")));
    }

    #[test]
    fn no_finding_alone_is_valid() {
        let library = parse(
            r#"
[library]
id = "normal"
name = "Normal"

[[cases]]
id = "n1"
expert_findings = ["No Finding"]
"#,
        );
        assert!(validate_case_library(&library).is_empty());
    }

    #[test]
    fn load_directory_recurses_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not [toml").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("b.toml"),
            VALID_TOML.replace("nih-sample", "nested-sample"),
        )
        .unwrap();

        let libraries = load_case_directory(dir.path()).unwrap();
        let ids: Vec<&str> = libraries.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["nih-sample", "nested-sample"]);
    }

    #[test]
    fn load_single_file_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cases.toml");
        std::fs::write(&file, VALID_TOML).unwrap();

        assert_eq!(load_case_libraries(&file).unwrap().len(), 1);
        assert_eq!(load_case_libraries(dir.path()).unwrap().len(), 1);
        assert!(load_case_directory(&file).is_err());
    }
}
