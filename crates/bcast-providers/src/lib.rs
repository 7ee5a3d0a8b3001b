//! Clients for the remote generation providers.
//!
//! This crate provides:
//! - A generic create/poll/fetch job client with timeout and cancellation
//! - OpenAI-style video jobs (multipart create, status, content download)
//! - Replicate predictions for lower thirds and background removal
//! - Segmind reference-voice speech synthesis
//! - Bounded retry helpers

pub mod cancel;
pub mod config;
pub mod error;
mod http;
pub mod job;
pub mod openai_video;
pub mod replicate;
pub mod requests;
pub mod retry;
pub mod segmind;

pub use cancel::CancelSignal;
pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use job::{AssetGenerator, JobClient, JobHandle, JobProvider, JobStatus, PollConfig};
pub use openai_video::OpenAiVideoProvider;
pub use replicate::{ReplicateInput, ReplicateProvider, BACKGROUND_REMOVAL_MODEL, LOWER_THIRD_MODEL};
pub use requests::{BackgroundRemovalRequest, ImageRequest, SpeechRequest, VideoRequest};
pub use retry::{retry_async, retry_async_when, Backoff, RetryConfig, RetryResult};
pub use segmind::SegmindTts;
