//! HTTP extractor and detector services.
//!
//! Both speak a small JSON protocol:
//!
//! * `POST {base_url}/extract` with `{"text": ...}` answers
//!   `{"findings": [{"type", "text", "negated"}]}`.
//! * `POST {base_url}/detect` with `{"case_id", "image_path"}` answers
//!   `{"findings": [...]}` where each entry is a label string or an object
//!   with a `type` field.
//!
//! A body carrying an `error` field means the service is up but its model
//! is not, which is reported as [`ExtractorError::Unavailable`].

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use radcoach_core::error::ExtractorError;
use radcoach_core::model::{Case, RawCandidate};
use radcoach_core::traits::{FindingDetector, FindingExtractor};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shared HTTP plumbing for the remote plug-ins.
struct ServiceClient {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl ServiceClient {
    fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ExtractorError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ExtractorError::Unavailable("no base_url configured".into()));
        }
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractorError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout_secs: timeout.as_secs(),
            client,
        })
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ExtractorError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractorError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                ExtractorError::NetworkError(format!(
                    "service not reachable at {}",
                    self.base_url
                ))
            } else {
                ExtractorError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractorError::ServiceError { status, message });
        }

        let envelope: Envelope<R> = response
            .json()
            .await
            .map_err(|e| ExtractorError::InvalidResponse(format!("failed to parse response: {e}")))?;

        match envelope {
            Envelope {
                error: Some(error), ..
            } => Err(ExtractorError::Unavailable(error)),
            Envelope {
                findings: Some(findings),
                ..
            } => Ok(findings),
            _ => Err(ExtractorError::InvalidResponse(
                "response has no 'findings' field".into(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct Envelope<R> {
    findings: Option<R>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    case_id: &'a str,
    image_path: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectedLabel {
    Label(String),
    Finding {
        #[serde(rename = "type")]
        finding_type: String,
    },
}

impl DetectedLabel {
    fn into_type(self) -> String {
        match self {
            DetectedLabel::Label(l) => l,
            DetectedLabel::Finding { finding_type } => finding_type,
        }
    }
}

/// Extractor backed by an HTTP service.
pub struct RemoteExtractor {
    name: String,
    service: ServiceClient,
}

impl RemoteExtractor {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ExtractorError> {
        Ok(Self {
            name: name.into(),
            service: ServiceClient::new(base_url, api_key, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.service.base_url
    }
}

#[async_trait]
impl FindingExtractor for RemoteExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, text), fields(extractor = %self.name, chars = text.len()))]
    async fn extract(&self, text: &str) -> anyhow::Result<Vec<RawCandidate>> {
        let findings: Vec<RawCandidate> =
            self.service.post("extract", &ExtractRequest { text }).await?;
        tracing::debug!("received {} candidates", findings.len());
        Ok(findings)
    }
}

/// Image detector backed by an HTTP service.
pub struct RemoteDetector {
    service: ServiceClient,
}

impl RemoteDetector {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ExtractorError> {
        Ok(Self {
            service: ServiceClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl FindingDetector for RemoteDetector {
    fn name(&self) -> &str {
        "remote_detector"
    }

    #[instrument(skip(self, case), fields(case_id = %case.id))]
    async fn detect(&self, case: &Case) -> anyhow::Result<BTreeSet<String>> {
        let request = DetectRequest {
            case_id: &case.id,
            image_path: case.image_path.as_deref(),
        };
        let labels: Vec<DetectedLabel> = self.service.post("detect", &request).await?;
        Ok(labels.into_iter().map(DetectedLabel::into_type).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn case() -> Case {
        Case {
            id: "00000061_015".into(),
            patient_info: String::new(),
            history: String::new(),
            image_path: Some("static/images/00000061_015.png".into()),
            expert_findings: vec![],
            auxiliary_findings: vec![],
            sample_report: None,
        }
    }

    fn classify(err: anyhow::Error) -> ExtractorError {
        match err.downcast::<ExtractorError>() {
            Ok(e) => e,
            Err(other) => panic!("unexpected error type: {other:#}"),
        }
    }

    #[tokio::test]
    async fn successful_extraction() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "findings": [
                {"type": "pneumonia", "text": "consolidation in the rll", "negated": false},
                {"type": "pneumothorax", "text": "no pneumothorax", "negated": true, "score": 0.98}
            ],
            "method": "chexbert"
        });

        Mock::given(method("POST"))
            .and(path("/extract"))
            .and(body_json(serde_json::json!({"text": "Some report."})))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let extractor =
            RemoteExtractor::new("chexbert", &server.uri(), Some("sk-test".into()), None).unwrap();
        let findings = extractor.extract("Some report.").await.unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].context, "consolidation in the rll");
        assert!(findings[1].negated);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let extractor = RemoteExtractor::new("r", &server.uri(), None, None).unwrap();
        let err = classify(extractor.extract("text").await.unwrap_err());

        assert!(matches!(err, ExtractorError::ServiceError { status: 503, .. }));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn model_not_loaded_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "model not available",
                "findings": []
            })))
            .mount(&server)
            .await;

        let extractor = RemoteExtractor::new("r", &server.uri(), None, None).unwrap();
        let err = classify(extractor.extract("text").await.unwrap_err());

        assert!(matches!(err, ExtractorError::Unavailable(ref m) if m == "model not available"));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let extractor = RemoteExtractor::new("r", &server.uri(), None, None).unwrap();
        let err = classify(extractor.extract("text").await.unwrap_err());
        assert!(matches!(err, ExtractorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn missing_findings_field_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let extractor = RemoteExtractor::new("r", &server.uri(), None, None).unwrap();
        let err = classify(extractor.extract("text").await.unwrap_err());
        assert!(matches!(err, ExtractorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let extractor = RemoteExtractor::new("r", "http://127.0.0.1:9", None, None).unwrap();
        let err = classify(extractor.extract("text").await.unwrap_err());
        assert!(matches!(err, ExtractorError::NetworkError(_)));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(RemoteExtractor::new("r", "  ", None, None).is_err());
        let extractor = RemoteExtractor::new("r", "http://localhost:8000/", None, None).unwrap();
        assert_eq!(extractor.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn detector_accepts_labels_and_objects() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(body_json(serde_json::json!({
                "case_id": "00000061_015",
                "image_path": "static/images/00000061_015.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "findings": ["visual_anomaly", {"type": "Cardiomegaly", "confidence": 0.7}]
            })))
            .mount(&server)
            .await;

        let detector = RemoteDetector::new(&server.uri(), None, None).unwrap();
        let labels = detector.detect(&case()).await.unwrap();
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec!["Cardiomegaly", "visual_anomaly"]
        );
    }

    #[tokio::test]
    async fn detector_client_error_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such image"))
            .mount(&server)
            .await;

        let detector = RemoteDetector::new(&server.uri(), None, None).unwrap();
        let err = classify(detector.detect(&case()).await.unwrap_err());
        assert!(err.is_permanent());
    }
}
