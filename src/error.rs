//! Error types for ytsig

use std::sync::Arc;
use thiserror::Error;

/// Main error type for ytsig operations
#[derive(Debug, Error)]
pub enum SigError {
    #[error("Could not extract functions: {0}")]
    ExtractionFailed(String),

    #[error("Fragment execution failed: {0}")]
    FragmentExecution(String),

    #[error("Boundary scan error: {0}")]
    BoundaryScan(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Format has neither url nor cipher")]
    MissingUrl,

    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shared(Arc<SigError>),
}

impl SigError {
    /// Unwrap a shared error when this is its only owner
    pub fn from_shared(err: Arc<SigError>) -> Self {
        match Arc::try_unwrap(err) {
            Ok(inner) => inner,
            Err(shared) => SigError::Shared(shared),
        }
    }

    fn inner(&self) -> &SigError {
        match self {
            SigError::Shared(inner) => inner.inner(),
            other => other,
        }
    }

    /// No fragments could be located in the player script
    pub fn is_extraction_failure(&self) -> bool {
        matches!(self.inner(), SigError::ExtractionFailed(_))
    }

    /// A fragment raised or returned an unusable value
    pub fn is_execution_failure(&self) -> bool {
        matches!(self.inner(), SigError::FragmentExecution(_))
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self.inner() {
            SigError::Fetch(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SigError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
