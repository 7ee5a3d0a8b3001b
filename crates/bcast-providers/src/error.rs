//! Error types for generation providers.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Remote rejected the job at creation time (bad prompt, auth, quota).
    #[error("{provider} rejected job creation ({status}): {body}")]
    CreationRejected {
        provider: String,
        status: u16,
        body: String,
    },

    /// A status or download request came back non-2xx.
    #[error("{provider} request failed ({status}): {body}")]
    RequestFailed {
        provider: String,
        status: u16,
        body: String,
    },

    /// Remote reported a terminal failure for the job.
    #[error("{provider} job {job_id} failed: {detail}")]
    JobFailed {
        provider: String,
        job_id: String,
        detail: String,
    },

    #[error("{provider} job {job_id} did not finish within {waited_secs}s")]
    Timeout {
        provider: String,
        job_id: String,
        waited_secs: u64,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Missing credentials: {0} is not configured")]
    MissingCredentials(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn creation_rejected(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::CreationRejected {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn request_failed(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn job_failed(
        provider: impl Into<String>,
        job_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::JobFailed {
            provider: provider.into(),
            job_id: job_id.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Transient failures worth another attempt: transport errors, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
