//! Persistence sinks for run snapshots.
//!
//! The pipeline hands a sink the segment snapshot after every status
//! transition and the video-level fields after every stage. All sinks are
//! last-write-wins: saving the same snapshot twice leaves the same state.
//! A new run replaces whatever an earlier run of the same story stored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bcast_models::{sanitize_file_stem, GeneratedVideo, VideoProgressUpdate, VideoSegment};
use tracing::{debug, warn};

use crate::assets::write_atomic;
use crate::error::StorageResult;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Start a run: drop every snapshot stored for the story and write the
    /// run's header and initial segment set.
    async fn begin_run(&self, video: &GeneratedVideo) -> StorageResult<()>;

    async fn save_segment(&self, story_id: &str, segment: &VideoSegment) -> StorageResult<()>;

    async fn update_video_progress(&self, update: &VideoProgressUpdate) -> StorageResult<()>;

    /// Last persisted state of a run, if any.
    async fn load_video(&self, story_id: &str) -> StorageResult<Option<GeneratedVideo>>;
}

/// Discards everything.
#[derive(Debug, Default, Clone)]
pub struct NoopSink;

#[async_trait]
impl PersistenceSink for NoopSink {
    async fn begin_run(&self, _video: &GeneratedVideo) -> StorageResult<()> {
        Ok(())
    }

    async fn save_segment(&self, _story_id: &str, _segment: &VideoSegment) -> StorageResult<()> {
        Ok(())
    }

    async fn update_video_progress(&self, _update: &VideoProgressUpdate) -> StorageResult<()> {
        Ok(())
    }

    async fn load_video(&self, _story_id: &str) -> StorageResult<Option<GeneratedVideo>> {
        Ok(None)
    }
}

#[derive(Default)]
struct StoredRun {
    header: Option<VideoProgressUpdate>,
    segments: HashMap<String, VideoSegment>,
    segment_writes: usize,
}

/// In-process sink, used by the API and tests.
#[derive(Default)]
pub struct MemorySink {
    runs: RwLock<HashMap<String, StoredRun>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment snapshots written for the story's current run, including the
    /// initial set written by `begin_run`.
    pub fn segment_writes(&self, story_id: &str) -> usize {
        self.runs
            .read()
            .map(|runs| runs.get(story_id).map_or(0, |r| r.segment_writes))
            .unwrap_or(0)
    }

    pub fn segment(&self, story_id: &str, segment_id: &str) -> Option<VideoSegment> {
        self.runs
            .read()
            .ok()?
            .get(story_id)?
            .segments
            .get(segment_id)
            .cloned()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn begin_run(&self, video: &GeneratedVideo) -> StorageResult<()> {
        let run = StoredRun {
            header: Some(video.progress_update()),
            segments: video
                .segments
                .iter()
                .map(|s| (s.id().to_string(), s.clone()))
                .collect(),
            segment_writes: video.segments.len(),
        };
        if let Ok(mut runs) = self.runs.write() {
            runs.insert(video.story_id.clone(), run);
        }
        Ok(())
    }

    async fn save_segment(&self, story_id: &str, segment: &VideoSegment) -> StorageResult<()> {
        if let Ok(mut runs) = self.runs.write() {
            let run = runs.entry(story_id.to_string()).or_default();
            run.segments.insert(segment.id().to_string(), segment.clone());
            run.segment_writes += 1;
        }
        Ok(())
    }

    async fn update_video_progress(&self, update: &VideoProgressUpdate) -> StorageResult<()> {
        if let Ok(mut runs) = self.runs.write() {
            runs.entry(update.story_id.clone()).or_default().header = Some(update.clone());
        }
        Ok(())
    }

    async fn load_video(&self, story_id: &str) -> StorageResult<Option<GeneratedVideo>> {
        let Ok(runs) = self.runs.read() else {
            return Ok(None);
        };
        Ok(runs.get(story_id).and_then(|run| {
            run.header.clone().map(|header| {
                GeneratedVideo::from_parts(header, run.segments.values().cloned().collect())
            })
        }))
    }
}

/// JSON files under `<root>/<story>/video.json` and
/// `<root>/<story>/segments/<segment>.json`, written atomically.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    root: PathBuf,
}

impl JsonFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn story_dir(&self, story_id: &str) -> PathBuf {
        self.root.join(sanitize_file_stem(story_id))
    }

    fn segment_path(&self, story_id: &str, segment_id: &str) -> PathBuf {
        self.story_dir(story_id)
            .join("segments")
            .join(format!("{}.json", sanitize_file_stem(segment_id)))
    }

    async fn read_segments(dir: &Path) -> StorageResult<Vec<VideoSegment>> {
        let mut segments = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(segments),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<VideoSegment>(&bytes) {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable segment snapshot"),
            }
        }
        Ok(segments)
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn begin_run(&self, video: &GeneratedVideo) -> StorageResult<()> {
        let segments_dir = self.story_dir(&video.story_id).join("segments");
        match tokio::fs::remove_dir_all(&segments_dir).await {
            Ok(()) => debug!(story_id = %video.story_id, "Cleared previous segment snapshots"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.update_video_progress(&video.progress_update()).await?;
        for segment in &video.segments {
            self.save_segment(&video.story_id, segment).await?;
        }
        Ok(())
    }

    async fn save_segment(&self, story_id: &str, segment: &VideoSegment) -> StorageResult<()> {
        let path = self.segment_path(story_id, segment.id());
        let json = serde_json::to_vec_pretty(segment)?;
        write_atomic(&path, &json).await?;
        debug!(story_id, segment_id = segment.id(), status = %segment.status, "Saved segment snapshot");
        Ok(())
    }

    async fn update_video_progress(&self, update: &VideoProgressUpdate) -> StorageResult<()> {
        let path = self.story_dir(&update.story_id).join("video.json");
        let json = serde_json::to_vec_pretty(update)?;
        write_atomic(&path, &json).await?;
        debug!(story_id = %update.story_id, progress = update.progress, status = %update.status, "Saved video progress");
        Ok(())
    }

    async fn load_video(&self, story_id: &str) -> StorageResult<Option<GeneratedVideo>> {
        let dir = self.story_dir(story_id);
        let header = match tokio::fs::read(dir.join("video.json")).await {
            Ok(bytes) => serde_json::from_slice::<VideoProgressUpdate>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let segments = Self::read_segments(&dir.join("segments")).await?;
        Ok(Some(GeneratedVideo::from_parts(header, segments)))
    }
}
