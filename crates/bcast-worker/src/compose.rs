//! Composition: per-segment mux, poster frames and the final concatenation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bcast_media::{concat_videos, extract_poster_frame, mux_audio_video, FfmpegRunner};
use bcast_models::{AssetKind, EncodingConfig, GeneratedVideo, SegmentStatus};
use bcast_providers::CancelSignal;
use bcast_storage::{AssetName, LocalAssetStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::logging::StoryLogger;
use crate::metrics;

/// Media operations the pipeline needs. Inputs and outputs are URLs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Video stream copied, audio re-encoded, cut to the shorter stream.
    async fn mux(&self, video_url: &str, audio_url: &str, out_name: &str) -> PipelineResult<String>;

    /// Poster frame of a clip.
    async fn snapshot(&self, video_url: &str, out_name: &str) -> PipelineResult<String>;

    /// Re-encode and join clips in the given order.
    async fn concat(&self, video_urls: &[String], out_name: &str) -> PipelineResult<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxResponse {
    pub muxed_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatRequest {
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatResponse {
    pub final_url: String,
}

/// Runs FFmpeg against files in a [`LocalAssetStore`].
///
/// Inputs may be stored URLs, `data:` URLs or remote URLs; outputs are
/// written into the store and returned as its public URLs.
pub struct LocalCompositor {
    store: Arc<LocalAssetStore>,
    work_dir: PathBuf,
    encoding: EncodingConfig,
    timeout: Duration,
    cancel: CancelSignal,
}

impl LocalCompositor {
    pub fn new(store: Arc<LocalAssetStore>, work_dir: impl Into<PathBuf>, encoding: EncodingConfig) -> Self {
        Self {
            store,
            work_dir: work_dir.into(),
            encoding,
            timeout: Duration::from_secs(600),
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill running FFmpeg processes when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_timeout(self.timeout.as_secs());
        match self.cancel.receiver() {
            Some(rx) => runner.with_cancel(rx),
            None => runner,
        }
    }

    fn scratch_dir(&self) -> PathBuf {
        self.work_dir
            .join(format!("compose-{}", Uuid::new_v4().simple()))
    }

    async fn output(&self, kind: AssetKind, out_name: &str, extension: &str) -> PipelineResult<(PathBuf, String)> {
        let (path, url) = self.store.output(&AssetName::custom(kind, out_name), extension);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok((path, url))
    }

    async fn mux_in(&self, scratch: &Path, video_url: &str, audio_url: &str, out_name: &str) -> PipelineResult<String> {
        let video = self.store.materialize(video_url, scratch).await?;
        let audio = self.store.materialize(audio_url, scratch).await?;
        let (out_path, out_url) = self.output(AssetKind::Video, out_name, "mp4").await?;
        mux_audio_video(&self.runner(), &video, &audio, &out_path)
            .await
            .map_err(|e| PipelineError::mux_failed(e.detail()))?;
        Ok(out_url)
    }

    async fn snapshot_in(&self, scratch: &Path, video_url: &str, out_name: &str) -> PipelineResult<String> {
        let video = self.store.materialize(video_url, scratch).await?;
        let (out_path, out_url) = self.output(AssetKind::Thumbnail, out_name, "png").await?;
        extract_poster_frame(&self.runner(), &video, &out_path)
            .await
            .map_err(|e| PipelineError::SnapshotFailed(e.detail()))?;
        Ok(out_url)
    }

    async fn concat_in(&self, scratch: &Path, video_urls: &[String], out_name: &str) -> PipelineResult<String> {
        let mut inputs = Vec::with_capacity(video_urls.len());
        for url in video_urls {
            inputs.push(self.store.materialize(url, scratch).await?);
        }
        let (out_path, out_url) = self.output(AssetKind::Video, out_name, "mp4").await?;
        concat_videos(&self.runner(), &inputs, &out_path, &self.encoding)
            .await
            .map_err(|e| PipelineError::concat_failed(e.detail()))?;
        Ok(out_url)
    }
}

async fn remove_scratch(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %dir.display(), error = %e, "Failed to remove scratch directory"),
    }
}

#[async_trait]
impl Compositor for LocalCompositor {
    async fn mux(&self, video_url: &str, audio_url: &str, out_name: &str) -> PipelineResult<String> {
        let scratch = self.scratch_dir();
        let result = self.mux_in(&scratch, video_url, audio_url, out_name).await;
        remove_scratch(&scratch).await;
        result
    }

    async fn snapshot(&self, video_url: &str, out_name: &str) -> PipelineResult<String> {
        let scratch = self.scratch_dir();
        let result = self.snapshot_in(&scratch, video_url, out_name).await;
        remove_scratch(&scratch).await;
        result
    }

    async fn concat(&self, video_urls: &[String], out_name: &str) -> PipelineResult<String> {
        if video_urls.is_empty() {
            return Err(PipelineError::concat_failed("no videos to concatenate"));
        }
        let scratch = self.scratch_dir();
        let result = self.concat_in(&scratch, video_urls, out_name).await;
        remove_scratch(&scratch).await;
        result
    }
}

/// Client for a composition service exposing `/api/compose/{mux,snapshot,concat}`.
pub struct RemoteCompositor {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteCompositor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, String>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("{url}: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{url} returned {status}: {text}"));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| format!("{url}: invalid response: {e}"))
    }
}

#[async_trait]
impl Compositor for RemoteCompositor {
    async fn mux(&self, video_url: &str, audio_url: &str, out_name: &str) -> PipelineResult<String> {
        let body = MuxRequest {
            video_url: Some(video_url.to_string()),
            audio_url: Some(audio_url.to_string()),
            out_name: Some(out_name.to_string()),
        };
        let response: MuxResponse = self
            .post("/api/compose/mux", &body)
            .await
            .map_err(PipelineError::mux_failed)?;
        Ok(response.muxed_url)
    }

    async fn snapshot(&self, video_url: &str, out_name: &str) -> PipelineResult<String> {
        let body = SnapshotRequest {
            video_url: Some(video_url.to_string()),
            out_name: Some(out_name.to_string()),
        };
        let response: SnapshotResponse = self
            .post("/api/compose/snapshot", &body)
            .await
            .map_err(PipelineError::SnapshotFailed)?;
        Ok(response.image_url)
    }

    async fn concat(&self, video_urls: &[String], out_name: &str) -> PipelineResult<String> {
        let body = ConcatRequest {
            videos: video_urls.to_vec(),
            out_name: Some(out_name.to_string()),
        };
        let response: ConcatResponse = self
            .post("/api/compose/concat", &body)
            .await
            .map_err(PipelineError::concat_failed)?;
        Ok(response.final_url)
    }
}

/// Output name shared by a segment's muxed clip and its poster frame.
pub fn segment_out_name(story_id: &str, segment_id: &str) -> String {
    format!("{story_id}_{segment_id}")
}

pub fn final_out_name(story_id: &str) -> String {
    format!("final_{story_id}")
}

/// The two composition steps, in order: mux, then concat.
pub struct CompositionEngine<'a> {
    compositor: &'a dyn Compositor,
    logger: &'a StoryLogger,
    already_muxed: HashSet<String>,
}

impl<'a> CompositionEngine<'a> {
    pub fn new(compositor: &'a dyn Compositor, logger: &'a StoryLogger) -> Self {
        Self {
            compositor,
            logger,
            already_muxed: HashSet::new(),
        }
    }

    /// Segments carried over from an earlier run keep their composed video.
    pub fn with_already_muxed(mut self, segment_ids: impl IntoIterator<Item = String>) -> Self {
        self.already_muxed.extend(segment_ids);
        self
    }

    /// Mux every segment that has both a video and separate audio.
    ///
    /// A failed mux keeps the original video. Returns the indexes of the
    /// segments whose video URL changed.
    pub async fn mux_segments(&self, video: &mut GeneratedVideo) -> Vec<usize> {
        let mut muxed = Vec::new();
        let story_id = video.story_id.clone();

        for (index, segment) in video.segments.iter_mut().enumerate() {
            if segment.status == SegmentStatus::Error
                || !segment.has_video()
                || !segment.has_audio()
                || self.already_muxed.contains(segment.id())
            {
                continue;
            }
            let (Some(video_url), Some(audio_url)) = (segment.video_url.clone(), segment.audio_url.clone())
            else {
                continue;
            };

            let out_name = segment_out_name(&story_id, segment.id());
            match self.compositor.mux(&video_url, &audio_url, &out_name).await {
                Ok(url) => {
                    debug!(story_id = %story_id, segment_id = segment.id(), url = %url, "Segment muxed");
                    segment.video_url = Some(url);
                    muxed.push(index);
                    metrics::record_composition("mux", "completed");
                }
                Err(e) => {
                    self.logger.log_warning(&format!(
                        "mux failed for {}, keeping original video: {}",
                        segment.id(),
                        e
                    ));
                    metrics::record_composition("mux", "failed");
                }
            }
        }
        muxed
    }

    /// Join every segment video in story order.
    ///
    /// Falls back to the last segment video when concatenation fails;
    /// `None` when no segment has a video.
    pub async fn concat_final(&self, video: &GeneratedVideo) -> Option<String> {
        let inputs = video.concat_inputs();
        if inputs.is_empty() {
            self.logger.log_warning("no segment videos to concatenate");
            metrics::record_composition("concat", "skipped");
            return None;
        }

        match self
            .compositor
            .concat(&inputs, &final_out_name(&video.story_id))
            .await
        {
            Ok(url) => {
                info!(story_id = %video.story_id, parts = inputs.len(), url = %url, "Final video assembled");
                metrics::record_composition("concat", "completed");
                Some(url)
            }
            Err(e) => {
                let fallback = video.last_video_url();
                warn!(
                    story_id = %video.story_id,
                    error = %e,
                    fallback = fallback.as_deref().unwrap_or(""),
                    "Concat failed, using last segment video"
                );
                metrics::record_composition("concat", "fallback");
                fallback
            }
        }
    }
}
