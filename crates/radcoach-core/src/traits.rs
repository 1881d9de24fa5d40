//! Plug-in seams for text extraction and image detection.
//!
//! Implemented by the `radcoach-extractors` crate. The engine only ever sees
//! these traits, so any backend (local keyword matcher, HTTP service, test
//! double) can be swapped in.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::model::{Case, RawCandidate};

/// Extracts finding mentions from free-text report prose.
#[async_trait]
pub trait FindingExtractor: Send + Sync {
    /// Human-readable extractor name (e.g. "keyword").
    fn name(&self) -> &str;

    /// Extract raw candidates from `text`.
    ///
    /// Failures should carry an [`ExtractorError`](crate::error::ExtractorError)
    /// so the engine can tell transient failures from permanent ones.
    async fn extract(&self, text: &str) -> anyhow::Result<Vec<RawCandidate>>;
}

/// Produces asserted finding labels for a case's image.
#[async_trait]
pub trait FindingDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Detect findings for `case`. Labels need not be normalized.
    async fn detect(&self, case: &Case) -> anyhow::Result<BTreeSet<String>>;
}
