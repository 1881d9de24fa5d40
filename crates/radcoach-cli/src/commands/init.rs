//! The `radcoach init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("radcoach.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("cases").context("failed to create cases directory")?;
    write_if_missing(Path::new("cases/example.toml"), EXAMPLE_CASES)?;

    println!("\nNext steps:");
    println!("  1. Edit radcoach.toml to point at your extraction service (optional)");
    println!("  2. Run: radcoach validate --cases cases/example.toml");
    println!("  3. Run: radcoach analyze --cases cases/example.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# radcoach configuration

parallelism = 4
max_retries = 2
retry_delay_ms = 500
extractor_timeout_secs = 30

# Rule-based extractor; needs no model.
[extractors.keyword]
type = "keyword"

# A CheXbert/RadBERT style extraction service.
# [extractors.chexbert]
# type = "remote"
# base_url = "http://localhost:8000"
# api_key = "${RADCOACH_API_KEY}"

# Where auxiliary image findings come from: "case_labels", "remote" or "none".
[detector]
type = "case_labels"

[style]
flagged_phrases = ["i think", "looks like", "maybe a", "stuff", "bad finding"]
min_words = 15
max_words = 100

[scoring]
missed_finding = 15
missed_negation = 5
misinterpretation = 20
negation_error = 25
style_advisory = 5
"#;

const EXAMPLE_CASES: &str = r#"[library]
id = "example"
name = "Example Cases"
description = "Two chest radiographs to get started"

[[cases]]
id = "example_pneumonia"
patient_info = "61 year old M"
history = "Fever and productive cough"
expert_findings = ["Pneumonia", "-pneumothorax"]
sample_report = """
Chest radiograph shows a focal consolidation in the right lower lobe, consistent with pneumonia. \
No pneumothorax is seen. Heart size is within normal limits.\
"""

[[cases]]
id = "example_effusion"
patient_info = "60 year old M"
history = "Progressive dyspnea"
expert_findings = ["Effusion", "Cardiomegaly"]
sample_report = "I think there is an enlarged heart. No effusion."
"#;
