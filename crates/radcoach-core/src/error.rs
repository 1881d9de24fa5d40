//! Extractor error types.
//!
//! These error types represent failures when calling an upstream finding
//! extractor or detector. Defined in `radcoach-core` so the analysis engine
//! can downcast and classify errors for retry decisions.

use thiserror::Error;

/// Errors that can occur when running a finding extractor or detector.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The extractor cannot serve requests at all (model not loaded, bad configuration).
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The extraction service returned an error response.
    #[error("service error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    /// The extraction service answered with something we could not parse.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ExtractorError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ExtractorError::Unavailable(_) | ExtractorError::InvalidResponse(_) => true,
            ExtractorError::ServiceError { status, .. } => (400..500).contains(status) && *status != 429,
            ExtractorError::Timeout(_) | ExtractorError::NetworkError(_) => false,
        }
    }
}

/// Classify an arbitrary extractor failure.
///
/// Errors that are not an [`ExtractorError`] are treated as transient.
pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ExtractorError>()
        .is_some_and(ExtractorError::is_permanent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_classification() {
        assert!(ExtractorError::Unavailable("no model".into()).is_permanent());
        assert!(ExtractorError::ServiceError {
            status: 404,
            message: "missing".into()
        }
        .is_permanent());
        assert!(!ExtractorError::ServiceError {
            status: 429,
            message: "slow down".into()
        }
        .is_permanent());
        assert!(!ExtractorError::ServiceError {
            status: 503,
            message: "busy".into()
        }
        .is_permanent());
        assert!(!ExtractorError::Timeout(5).is_permanent());
    }

    #[test]
    fn classify_through_anyhow() {
        let err: anyhow::Error = ExtractorError::Unavailable("gone".into()).into();
        assert!(is_permanent(&err));

        let other = anyhow::anyhow!("something odd");
        assert!(!is_permanent(&other));
    }
}
