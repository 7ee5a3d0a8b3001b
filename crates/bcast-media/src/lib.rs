//! FFmpeg CLI wrapper for broadcast composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - The three composition operations: mux, poster-frame snapshot, concat

pub mod command;
pub mod concat;
pub mod error;
pub mod mux;
pub mod probe;
pub mod progress;
pub mod snapshot;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{concat_command, concat_filter, concat_videos, ConcatPart};
pub use error::{MediaError, MediaResult};
pub use mux::{mux_audio_video, mux_command};
pub use probe::{parse_probe_output, probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use snapshot::{extract_poster_frame, snapshot_command};
