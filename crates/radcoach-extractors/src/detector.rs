//! Detector that replays precomputed labels from the case file.

use std::collections::BTreeSet;

use async_trait::async_trait;

use radcoach_core::model::Case;
use radcoach_core::traits::FindingDetector;

/// Returns each case's `auxiliary_findings` unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseLabelDetector;

#[async_trait]
impl FindingDetector for CaseLabelDetector {
    fn name(&self) -> &str {
        "case_labels"
    }

    async fn detect(&self, case: &Case) -> anyhow::Result<BTreeSet<String>> {
        Ok(case.auxiliary_findings.iter().cloned().collect())
    }
}
