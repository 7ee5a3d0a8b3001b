//! Shared data models for the broadcast pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Stories and their segments (pipeline input)
//! - Per-segment and per-video generation state (pipeline output)
//! - Progress snapshots for observers
//! - Provider job states and asset references
//! - Encoding configuration for composition

pub mod asset;
pub mod encoding;
pub mod job;
pub mod progress;
pub mod story;
pub mod video;

// Re-export common types
pub use asset::{
    asset_file_stem, decode_data_url, encode_data_url, sanitize_file_stem, AssetKind, AssetRef,
};
pub use encoding::EncodingConfig;
pub use job::{JobId, JobState};
pub use progress::{GenerationProgress, PipelineStage};
pub use story::{LowerThird, Segment, SegmentKind, Story};
pub use video::{
    GeneratedVideo, SegmentStatus, StatusTransitionError, VideoProgressUpdate, VideoSegment,
    VideoStatus,
};
