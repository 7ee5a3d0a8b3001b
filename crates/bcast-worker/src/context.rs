//! Per-run collaborators shared by every stage.

use std::sync::Arc;

use bcast_models::{GeneratedVideo, GenerationProgress, PipelineStage, VideoSegment};
use bcast_providers::{
    AssetGenerator, BackgroundRemovalRequest, CancelSignal, ImageRequest, JobClient,
    OpenAiVideoProvider, ProviderConfig, ReplicateProvider, SegmindTts, SpeechRequest,
    VideoRequest,
};
use bcast_storage::{AssetStore, PersistenceSink};
use tracing::warn;

use crate::characters::CharacterDirectory;
use crate::compose::Compositor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StoryLogger;
use crate::metrics;
use crate::progress::ProgressReporter;

/// Generation backends, one per asset type.
#[derive(Clone)]
pub struct Providers {
    pub video: Arc<dyn AssetGenerator<VideoRequest>>,
    pub speech: Arc<dyn AssetGenerator<SpeechRequest>>,
    pub lower_thirds: Arc<dyn AssetGenerator<ImageRequest>>,
    /// Background removal is skipped when absent.
    pub background_remover: Option<Arc<dyn AssetGenerator<BackgroundRemovalRequest>>>,
}

impl Providers {
    /// HTTP providers from configuration. Fails when a required key is missing.
    pub fn from_config(config: &ProviderConfig, remove_backgrounds: bool) -> PipelineResult<Self> {
        let poll = config.poll.clone();
        let video = JobClient::new(OpenAiVideoProvider::from_config(config)?, poll.clone());
        let lower_thirds = JobClient::new(ReplicateProvider::<ImageRequest>::lower_thirds(config)?, poll.clone());
        let background_remover: Option<Arc<dyn AssetGenerator<BackgroundRemovalRequest>>> =
            if remove_backgrounds {
                Some(Arc::new(JobClient::new(
                    ReplicateProvider::<BackgroundRemovalRequest>::background_remover(config)?,
                    poll,
                )))
            } else {
                None
            };

        Ok(Self {
            video: Arc::new(video),
            speech: Arc::new(SegmindTts::from_config(config)?),
            lower_thirds: Arc::new(lower_thirds),
            background_remover,
        })
    }
}

/// Borrowed view of the pipeline for one run.
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub providers: &'a Providers,
    pub characters: &'a dyn CharacterDirectory,
    pub store: &'a dyn AssetStore,
    pub compositor: &'a dyn Compositor,
    pub sink: &'a dyn PersistenceSink,
    pub reporter: &'a dyn ProgressReporter,
    pub cancel: &'a CancelSignal,
    pub logger: &'a StoryLogger,
}

impl StageContext<'_> {
    pub fn story_id(&self) -> &str {
        self.logger.story_id()
    }

    /// Replace the story's stored snapshots with this run's initial state.
    /// Failures are logged and swallowed.
    pub async fn begin_run(&self, video: &GeneratedVideo) {
        if let Err(e) = self.sink.begin_run(video).await {
            warn!(story_id = %video.story_id, error = %e, "Failed to persist run start");
            metrics::record_persist_failure("run");
        }
    }

    /// Save a segment snapshot. Failures are logged and swallowed.
    pub async fn persist_segment(&self, segment: &VideoSegment) {
        if let Err(e) = self.sink.save_segment(self.story_id(), segment).await {
            warn!(
                story_id = %self.story_id(),
                segment_id = segment.id(),
                error = %e,
                "Failed to persist segment"
            );
            metrics::record_persist_failure("segment");
        }
    }

    /// Save the video-level fields. Failures are logged and swallowed.
    pub async fn persist_video(&self, video: &GeneratedVideo) {
        if let Err(e) = self.sink.update_video_progress(&video.progress_update()).await {
            warn!(story_id = %video.story_id, error = %e, "Failed to persist video progress");
            metrics::record_persist_failure("video");
        }
    }

    /// Enter a stage: log, notify observers and record the percentage.
    pub async fn enter_stage(&self, video: &mut GeneratedVideo, stage: PipelineStage) {
        self.logger.log_stage(stage);
        video.set_progress(stage.percent());
        self.reporter.report(&GenerationProgress::at(stage));
        self.persist_video(video).await;
    }

    pub fn report_segment(&self, stage: PipelineStage, segment_id: &str) {
        self.reporter
            .report(&GenerationProgress::at(stage).with_segment(segment_id));
    }

    pub fn ensure_not_cancelled(&self) -> PipelineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}
