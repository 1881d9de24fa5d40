//! Central analysis orchestrator.
//!
//! Runs every configured extractor and the image detector concurrently,
//! turns their output into finding sets, assembles the gold standard and
//! hands everything to the [`Reconciler`]. Batches of submissions run with
//! bounded parallelism.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{is_permanent, ExtractorError};
use crate::findings::FindingSet;
use crate::gold::GoldStandard;
use crate::model::{normalize_finding_type, Case, CaseLibrary, RawCandidate, Submission};
use crate::reconcile::Reconciler;
use crate::report::{
    AnalysisReport, BatchFailure, BatchReport, Diagnostic, DiagnosticKind, ExtractorRun,
    LibrarySummary,
};
use crate::statistics::compute_aggregate_stats;
use crate::traits::{FindingDetector, FindingExtractor};

/// Upper bound for the exponential retry backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the analysis engine.
#[derive(Debug, Clone)]
pub struct AnalysisEngineConfig {
    /// Maximum concurrent analyses in a batch.
    pub parallelism: usize,
    /// Retries on transient extractor errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Limit for a single extractor or detector call.
    pub extractor_timeout: Duration,
}

impl Default for AnalysisEngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            extractor_timeout: Duration::from_secs(30),
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_analysis_start(&self, case_id: &str);
    fn on_analysis_complete(&self, report: &AnalysisReport);
    fn on_analysis_error(&self, case_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_analysis_start(&self, _: &str) {}
    fn on_analysis_complete(&self, _: &AnalysisReport) {}
    fn on_analysis_error(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The central analysis engine.
pub struct AnalysisEngine {
    extractors: Vec<Arc<dyn FindingExtractor>>,
    detector: Option<Arc<dyn FindingDetector>>,
    reconciler: Reconciler,
    config: AnalysisEngineConfig,
}

impl AnalysisEngine {
    pub fn new(
        extractors: Vec<Arc<dyn FindingExtractor>>,
        detector: Option<Arc<dyn FindingDetector>>,
        reconciler: Reconciler,
        config: AnalysisEngineConfig,
    ) -> Self {
        Self {
            extractors,
            detector,
            reconciler,
            config,
        }
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Analyze one learner report against `case`.
    ///
    /// Never fails: a broken extractor or detector contributes an empty
    /// finding set and a diagnostic on the feedback.
    pub async fn analyze(&self, case: &Case, report_text: &str) -> AnalysisReport {
        let start = Instant::now();

        let extract_all = join_all(
            self.extractors
                .iter()
                .map(|extractor| self.run_extractor(extractor.as_ref(), report_text)),
        );
        let (runs, detected) = tokio::join!(extract_all, self.run_detector(case));

        let mut diagnostics = Vec::new();
        let mut learner_findings = FindingSet::new();
        for run in &runs {
            if run.succeeded {
                learner_findings.merge(&FindingSet::from_candidates(&run.candidates));
            } else {
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::ExtractorFailed,
                    finding_type: None,
                    message: format!(
                        "extractor '{}' failed: {}",
                        run.extractor,
                        run.error.as_deref().unwrap_or("unknown error")
                    ),
                });
            }
        }

        let auxiliary = match detected {
            Some(Ok(labels)) => labels,
            Some(Err((name, e))) => {
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::DetectorFailed,
                    finding_type: None,
                    message: format!("detector '{name}' failed: {e:#}"),
                });
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };

        let gold = GoldStandard::from_labels(&case.expert_findings, &auxiliary);
        let comparison = self.reconciler.compare(&learner_findings, &gold);
        let mut feedback = self.reconciler.feedback(&comparison, &gold, report_text);
        feedback.diagnostics.extend(diagnostics);

        tracing::debug!(
            "case {}: score {}, {} learner findings, {} gold findings",
            case.id,
            feedback.overall_score,
            learner_findings.len(),
            gold.asserted().len() + gold.negated().len()
        );

        AnalysisReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            case_id: case.id.clone(),
            gold_standard: gold.to_labels(),
            learner_findings,
            extractor_runs: runs,
            comparison,
            feedback,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Analyze many submissions against one library.
    ///
    /// Submissions whose case ID is not in the library are reported as
    /// failures. Analyses are returned in submission order.
    pub async fn analyze_batch(
        &self,
        library: &CaseLibrary,
        submissions: &[Submission],
        progress: &dyn ProgressReporter,
    ) -> BatchReport {
        let start = Instant::now();
        let semaphore = Semaphore::new(self.config.parallelism.max(1));
        let mut failures = Vec::new();
        let mut futures = FuturesUnordered::new();

        for (index, submission) in submissions.iter().enumerate() {
            let Some(case) = library.get(&submission.case_id) else {
                let error = format!("unknown case '{}'", submission.case_id);
                tracing::warn!("{error} in library '{}', skipping", library.id);
                progress.on_analysis_error(&submission.case_id, &error);
                failures.push(BatchFailure {
                    case_id: submission.case_id.clone(),
                    error,
                });
                continue;
            };

            let semaphore = &semaphore;
            futures.push(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => {
                        progress.on_analysis_start(&case.id);
                        Ok(self.analyze(case, &submission.report_text).await)
                    }
                    Err(_) => Err(anyhow::anyhow!("semaphore closed")),
                };
                (index, case.id.clone(), result)
            });
        }

        let mut analyses = Vec::new();
        let total = futures.len() + failures.len();

        while let Some((index, case_id, result)) = futures.next().await {
            match result {
                Ok(report) => {
                    progress.on_analysis_complete(&report);
                    analyses.push((index, report));
                }
                Err(e) => {
                    tracing::error!("analysis failed for {case_id}: {e:#}");
                    progress.on_analysis_error(&case_id, &e.to_string());
                    failures.push(BatchFailure {
                        case_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        analyses.sort_by_key(|(index, _)| *index);
        let analyses: Vec<AnalysisReport> = analyses.into_iter().map(|(_, r)| r).collect();

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, analyses.len(), failures.len(), elapsed);

        BatchReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            library: LibrarySummary {
                id: library.id.clone(),
                name: library.name.clone(),
                case_count: library.cases.len(),
            },
            aggregate: compute_aggregate_stats(&analyses),
            analyses,
            failures,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    async fn run_extractor(&self, extractor: &dyn FindingExtractor, text: &str) -> ExtractorRun {
        let start = Instant::now();
        let (result, attempts) = self
            .call_with_retry(extractor.name(), || extractor.extract(text))
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(candidates) => ExtractorRun {
                extractor: extractor.name().to_string(),
                succeeded: true,
                error: None,
                candidates: normalize_candidates(candidates),
                attempts,
                duration_ms,
            },
            Err(e) => {
                tracing::warn!(
                    "extractor '{}' failed after {attempts} attempt(s), using empty finding set: {e:#}",
                    extractor.name()
                );
                ExtractorRun {
                    extractor: extractor.name().to_string(),
                    succeeded: false,
                    error: Some(format!("{e:#}")),
                    candidates: Vec::new(),
                    attempts,
                    duration_ms,
                }
            }
        }
    }

    async fn run_detector(
        &self,
        case: &Case,
    ) -> Option<Result<BTreeSet<String>, (String, anyhow::Error)>> {
        let detector = self.detector.as_ref()?;
        let (result, attempts) = self
            .call_with_retry(detector.name(), || detector.detect(case))
            .await;
        Some(result.map_err(|e| {
            tracing::warn!(
                "detector '{}' failed after {attempts} attempt(s) for case {}: {e:#}",
                detector.name(),
                case.id
            );
            (detector.name().to_string(), e)
        }))
    }

    /// Call `op` under the configured timeout, retrying transient failures
    /// with exponential backoff. Returns the outcome and the number of calls.
    async fn call_with_retry<T, F, Fut>(&self, name: &str, mut op: F) -> (anyhow::Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay.min(MAX_RETRY_DELAY);
        let mut attempts = 0;

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            attempts += 1;

            let outcome = match tokio::time::timeout(self.config.extractor_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExtractorError::Timeout(self.config.extractor_timeout.as_secs()).into()),
            };

            match outcome {
                Ok(value) => return (Ok(value), attempts),
                Err(e) if is_permanent(&e) => return (Err(e), attempts),
                Err(e) => {
                    tracing::debug!("{name}: attempt {attempts} failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| anyhow::anyhow!("{name}: no attempts made"));
        (Err(error), attempts)
    }
}

/// Normalize candidate types into the gold-standard vocabulary, dropping
/// candidates whose type normalizes to nothing.
fn normalize_candidates(candidates: Vec<RawCandidate>) -> Vec<RawCandidate> {
    candidates
        .into_iter()
        .filter_map(|mut c| {
            c.finding_type = normalize_finding_type(&c.finding_type);
            (!c.finding_type.is_empty()).then_some(c)
        })
        .collect()
}
