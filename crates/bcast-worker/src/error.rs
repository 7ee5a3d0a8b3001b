//! Pipeline error types.

use std::fmt;

use bcast_models::StatusTransitionError;
use bcast_providers::ProviderError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification used on segments, in logs and in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    JobCreationFailed,
    JobTimeout,
    JobFailed,
    MuxFailed,
    ConcatFailed,
    PipelineFatal,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::JobCreationFailed => "job_creation_failed",
            ErrorKind::JobTimeout => "job_timeout",
            ErrorKind::JobFailed => "job_failed",
            ErrorKind::MuxFailed => "mux_failed",
            ErrorKind::ConcatFailed => "concat_failed",
            ErrorKind::PipelineFatal => "pipeline_fatal",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Segment has nothing a provider could render.
    #[error("Segment {segment_id} is missing {what}")]
    MissingInput { segment_id: String, what: &'static str },

    #[error("Mux failed: {0}")]
    MuxFailed(String),

    #[error("Concat failed: {0}")]
    ConcatFailed(String),

    #[error("Snapshot failed: {0}")]
    SnapshotFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] bcast_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] bcast_media::MediaError),

    #[error("Invalid story: {0}")]
    InvalidStory(String),

    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn missing(segment_id: impl Into<String>, what: &'static str) -> Self {
        Self::MissingInput {
            segment_id: segment_id.into(),
            what,
        }
    }

    pub fn mux_failed(msg: impl Into<String>) -> Self {
        Self::MuxFailed(msg.into())
    }

    pub fn concat_failed(msg: impl Into<String>) -> Self {
        Self::ConcatFailed(msg.into())
    }

    pub fn invalid_story(msg: impl Into<String>) -> Self {
        Self::InvalidStory(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Provider(e) => match e {
                ProviderError::CreationRejected { .. }
                | ProviderError::MissingCredentials(_)
                | ProviderError::InvalidRequest(_) => ErrorKind::JobCreationFailed,
                ProviderError::Timeout { .. } => ErrorKind::JobTimeout,
                ProviderError::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::JobFailed,
            },
            PipelineError::MissingInput { .. } => ErrorKind::JobCreationFailed,
            PipelineError::MuxFailed(_) => ErrorKind::MuxFailed,
            PipelineError::ConcatFailed(_) => ErrorKind::ConcatFailed,
            PipelineError::SnapshotFailed(_)
            | PipelineError::Storage(_)
            | PipelineError::Media(_) => ErrorKind::JobFailed,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::InvalidStory(_)
            | PipelineError::Transition(_)
            | PipelineError::ConfigError(_)
            | PipelineError::Io(_) => ErrorKind::PipelineFatal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
