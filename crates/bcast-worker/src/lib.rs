//! Broadcast generation worker.
//!
//! This crate provides:
//! - Prompt construction and character tag expansion
//! - Per-segment footage, lower-third and narration stages
//! - Mux/concat composition, locally with FFmpeg or over HTTP
//! - Progress reporting and per-transition persistence
//! - The `VideoPipeline` that runs a story end to end

pub mod characters;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod graphics;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod voiceover;

pub use characters::{CharacterDirectory, CharacterProfile, StaticCharacterDirectory};
pub use compose::{
    CompositionEngine, Compositor, ConcatRequest, ConcatResponse, LocalCompositor, MuxRequest,
    MuxResponse, RemoteCompositor, SnapshotRequest, SnapshotResponse,
};
pub use config::{DurationWindow, PipelineConfig};
pub use context::Providers;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use logging::StoryLogger;
pub use pipeline::VideoPipeline;
pub use progress::{FnReporter, NoopReporter, ProgressReporter, WatchReporter};
