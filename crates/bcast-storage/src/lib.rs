//! Asset storage and run persistence.
//!
//! This crate provides:
//! - Durable local asset storage with public URLs and URL resolution
//! - A bounded, paced transfer queue for quota-limited destinations
//! - An S3-compatible bucket client and a post-run asset mirror
//! - Persistence sinks for per-segment and per-video snapshots

pub mod assets;
pub mod client;
pub mod error;
pub mod mirror;
pub mod persistence;
pub mod transfer;

pub use assets::{
    mime_for_path, write_atomic, AssetName, AssetStore, LocalAssetStore, PassthroughAssetStore,
};
pub use client::{BucketClient, BucketConfig, ObjectSink};
pub use error::{StorageError, StorageResult};
pub use mirror::{AssetMirror, MirrorReport};
pub use persistence::{JsonFileSink, MemorySink, NoopSink, PersistenceSink};
pub use transfer::{TransferQueue, DEFAULT_MAX_TRANSFERS, DEFAULT_PACING};
