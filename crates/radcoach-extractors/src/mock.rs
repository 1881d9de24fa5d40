//! Mock extractor and detector for testing.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use radcoach_core::error::ExtractorError;
use radcoach_core::model::{Case, RawCandidate};
use radcoach_core::traits::{FindingDetector, FindingExtractor};

/// How a mock fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// A network error; the engine retries it.
    Transient,
    /// An unavailable model; the engine gives up at once.
    Permanent,
}

impl MockFailure {
    fn error(self) -> ExtractorError {
        match self {
            MockFailure::Transient => ExtractorError::NetworkError("mock connection reset".into()),
            MockFailure::Permanent => ExtractorError::Unavailable("mock model not loaded".into()),
        }
    }
}

/// A mock extractor for testing the engine without a real model.
///
/// Returns configurable candidates based on report text matching.
pub struct MockExtractor {
    name: String,
    /// Map of text substring -> candidates.
    responses: HashMap<String, Vec<RawCandidate>>,
    /// Candidates if no substring matches.
    default_response: Vec<RawCandidate>,
    /// Fail this many calls before answering.
    failures_left: AtomicU32,
    failure: MockFailure,
    call_count: AtomicU32,
    last_text: Mutex<Option<String>>,
}

impl MockExtractor {
    /// Create a mock with the given substring -> candidates mappings.
    pub fn new(responses: HashMap<String, Vec<RawCandidate>>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            default_response: Vec::new(),
            failures_left: AtomicU32::new(0),
            failure: MockFailure::Transient,
            call_count: AtomicU32::new(0),
            last_text: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same candidates.
    pub fn with_fixed_response(candidates: Vec<RawCandidate>) -> Self {
        Self {
            default_response: candidates,
            ..Self::new(HashMap::new())
        }
    }

    /// Create a mock that fails every call.
    pub fn failing(failure: MockFailure) -> Self {
        Self::new(HashMap::new()).fail_first(u32::MAX, failure)
    }

    /// Fail the first `calls` calls with `failure`, then answer normally.
    pub fn fail_first(mut self, calls: u32, failure: MockFailure) -> Self {
        self.failures_left = AtomicU32::new(calls);
        self.failure = failure;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the number of calls made to this extractor.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last text passed to this extractor.
    pub fn last_text(&self) -> Option<String> {
        self.last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl FindingExtractor for MockExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(text.to_string());

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.failure.error().into());
        }

        let candidates = self
            .responses
            .iter()
            .find(|(key, _)| text.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());
        Ok(candidates)
    }
}

/// A mock image detector.
pub struct MockDetector {
    labels: Option<BTreeSet<String>>,
    call_count: AtomicU32,
}

impl MockDetector {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: Some(labels.iter().map(|l| l.to_string()).collect()),
            call_count: AtomicU32::new(0),
        }
    }

    /// A detector whose model is never available.
    pub fn failing() -> Self {
        Self {
            labels: None,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FindingDetector for MockDetector {
    fn name(&self) -> &str {
        "mock_detector"
    }

    async fn detect(&self, _case: &Case) -> anyhow::Result<BTreeSet<String>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        match &self.labels {
            Some(labels) => Ok(labels.clone()),
            None => Err(MockFailure::Permanent.error().into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_response() {
        let extractor =
            MockExtractor::with_fixed_response(vec![RawCandidate::new("effusion", "", false)]);
        let found = extractor.extract("anything").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(extractor.call_count(), 1);
        assert_eq!(extractor.last_text().as_deref(), Some("anything"));
    }

    #[tokio::test]
    async fn text_matching() {
        let mut responses = HashMap::new();
        responses.insert(
            "effusion".to_string(),
            vec![RawCandidate::new("effusion", "", false)],
        );
        responses.insert(
            "pneumothorax".to_string(),
            vec![RawCandidate::new("pneumothorax", "", true)],
        );
        let extractor = MockExtractor::new(responses);

        let found = extractor.extract("No pneumothorax.").await.unwrap();
        assert!(found[0].negated);

        let found = extractor.extract("Nothing relevant.").await.unwrap();
        assert!(found.is_empty());
        assert_eq!(extractor.call_count(), 2);
    }

    #[tokio::test]
    async fn fails_then_recovers() {
        let extractor = MockExtractor::with_fixed_response(vec![])
            .fail_first(2, MockFailure::Transient)
            .named("flaky");

        assert!(extractor.extract("a").await.is_err());
        assert!(extractor.extract("a").await.is_err());
        assert!(extractor.extract("a").await.is_ok());
        assert_eq!(extractor.name(), "flaky");
    }

    #[tokio::test]
    async fn permanent_failure_classifies() {
        let extractor = MockExtractor::failing(MockFailure::Permanent);
        let err = extractor.extract("a").await.unwrap_err();
        assert!(radcoach_core::error::is_permanent(&err));
    }

    #[tokio::test]
    async fn detector_labels_and_failure() {
        let case = Case {
            id: "c".into(),
            patient_info: String::new(),
            history: String::new(),
            image_path: None,
            expert_findings: vec![],
            auxiliary_findings: vec![],
            sample_report: None,
        };
        let detector = MockDetector::with_labels(&["edema"]);
        assert_eq!(detector.detect(&case).await.unwrap().len(), 1);
        assert!(MockDetector::failing().detect(&case).await.is_err());
        assert_eq!(detector.call_count(), 1);
    }
}
