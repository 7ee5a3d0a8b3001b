//! Story to broadcast: the full generation run.

use std::sync::Arc;

use bcast_models::{GeneratedVideo, GenerationProgress, PipelineStage, SegmentStatus, Story};
use bcast_providers::{CancelSignal, ProviderConfig};
use bcast_storage::{
    AssetMirror, AssetStore, BucketClient, BucketConfig, JsonFileSink, LocalAssetStore,
    MemorySink, NoopSink, PersistenceSink, TransferQueue,
};
use tracing::{info, warn, Instrument};
use validator::Validate;

use crate::characters::{CharacterDirectory, StaticCharacterDirectory};
use crate::compose::{CompositionEngine, Compositor, LocalCompositor, RemoteCompositor};
use crate::config::PipelineConfig;
use crate::context::{Providers, StageContext};
use crate::error::{PipelineError, PipelineResult};
use crate::generator::generate_primary_assets;
use crate::graphics::{generate_lower_thirds, remove_lower_third_backgrounds};
use crate::logging::StoryLogger;
use crate::metrics;
use crate::progress::{NoopReporter, ProgressReporter};
use crate::voiceover::generate_voiceovers;

/// Runs stories through footage, graphics, narration and composition.
///
/// Segments are processed one at a time. Per-segment failures are recorded
/// on the segment; only fatal errors and cancellation fail the run.
#[derive(Clone)]
pub struct VideoPipeline {
    config: Arc<PipelineConfig>,
    providers: Providers,
    characters: Arc<dyn CharacterDirectory>,
    store: Arc<dyn AssetStore>,
    compositor: Arc<dyn Compositor>,
    sink: Arc<dyn PersistenceSink>,
    reporter: Arc<dyn ProgressReporter>,
    mirror: Option<AssetMirror>,
}

impl VideoPipeline {
    pub fn new(
        config: PipelineConfig,
        providers: Providers,
        store: Arc<dyn AssetStore>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            providers,
            characters: Arc::new(StaticCharacterDirectory::default_roster()),
            store,
            compositor,
            sink: Arc::new(NoopSink),
            reporter: Arc::new(NoopReporter),
            mirror: None,
        }
    }

    /// Wire up HTTP providers, local storage and the configured compositor,
    /// sink and character roster.
    pub async fn from_config(
        config: PipelineConfig,
        provider_config: &ProviderConfig,
        bucket: Option<BucketConfig>,
    ) -> PipelineResult<Self> {
        let providers =
            Providers::from_config(provider_config, config.remove_lower_third_backgrounds)?;
        let client = provider_config.http_client()?;

        let local = Arc::new(LocalAssetStore::new(
            &config.asset_dir,
            &config.public_base_url,
            client.clone(),
        ));
        local.ensure_dirs().await?;

        let compositor: Arc<dyn Compositor> = match &config.compositor_url {
            Some(url) => Arc::new(RemoteCompositor::new(client, url)),
            None => Arc::new(
                LocalCompositor::new(local.clone(), &config.work_dir, config.encoding.clone())
                    .with_timeout(config.ffmpeg_timeout),
            ),
        };
        let sink: Arc<dyn PersistenceSink> = match &config.persistence_dir {
            Some(dir) => Arc::new(JsonFileSink::new(dir)),
            None => Arc::new(MemorySink::new()),
        };
        let characters: Arc<dyn CharacterDirectory> = match &config.characters_file {
            Some(path) => Arc::new(StaticCharacterDirectory::from_json_file(path)?),
            None => Arc::new(StaticCharacterDirectory::default_roster()),
        };
        let mirror = bucket.map(|bucket| {
            AssetMirror::new(
                Arc::new(BucketClient::new(bucket)),
                local.clone(),
                TransferQueue::default(),
            )
        });

        let mut pipeline = Self::new(config, providers, local, compositor)
            .with_sink(sink)
            .with_characters(characters);
        pipeline.mirror = mirror;
        Ok(pipeline)
    }

    pub fn with_characters(mut self, characters: Arc<dyn CharacterDirectory>) -> Self {
        self.characters = characters;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Mirror stored assets after each completed run.
    pub fn with_mirror(mut self, mirror: AssetMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> Arc<dyn PersistenceSink> {
        self.sink.clone()
    }

    pub async fn generate_video(&self, story: &Story) -> PipelineResult<GeneratedVideo> {
        self.generate_video_with_cancel(story, CancelSignal::never()).await
    }

    /// Run a story; `cancel` stops polling and fails the run with `Cancelled`.
    pub async fn generate_video_with_cancel(
        &self,
        story: &Story,
        cancel: CancelSignal,
    ) -> PipelineResult<GeneratedVideo> {
        if let Err(e) = validate_story(story) {
            return Err(self.reject(story, e).await);
        }
        self.run(GeneratedVideo::from_story(story), Vec::new(), &cancel, "generate_video")
            .await
    }

    /// Re-run a story, keeping segments that completed in `previous` and
    /// whose definition is unchanged.
    pub async fn resume_video(
        &self,
        story: &Story,
        previous: &GeneratedVideo,
        cancel: CancelSignal,
    ) -> PipelineResult<GeneratedVideo> {
        if let Err(e) = validate_story(story) {
            return Err(self.reject(story, e).await);
        }
        let mut video = GeneratedVideo::from_story(story);

        let mut kept = Vec::new();
        for segment in video.segments.iter_mut() {
            let done = previous
                .segment(segment.id())
                .filter(|p| p.status == SegmentStatus::Completed && p.segment == segment.segment);
            if let Some(done) = done {
                let position = segment.position;
                *segment = done.clone();
                segment.position = position;
                kept.push(segment.id().to_string());
            }
        }
        info!(
            story_id = %story.story_id,
            kept = kept.len(),
            regenerating = video.segments.len() - kept.len(),
            "Resuming story"
        );

        self.run(video, kept, &cancel, "resume_video").await
    }

    async fn run(
        &self,
        mut video: GeneratedVideo,
        carried_over: Vec<String>,
        cancel: &CancelSignal,
        operation: &str,
    ) -> PipelineResult<GeneratedVideo> {
        let logger = StoryLogger::new(&video.story_id, operation);
        let span = logger.create_span();

        async {
            let ctx = StageContext {
                config: &self.config,
                providers: &self.providers,
                characters: self.characters.as_ref(),
                store: self.store.as_ref(),
                compositor: self.compositor.as_ref(),
                sink: self.sink.as_ref(),
                reporter: self.reporter.as_ref(),
                cancel,
                logger: &logger,
            };

            logger.log_start(&format!("{} ({} segments)", video.title, video.segments.len()));
            ctx.begin_run(&video).await;
            ctx.enter_stage(&mut video, PipelineStage::Starting).await;

            match run_stages(&ctx, &mut video, carried_over).await {
                Ok(final_video_url) => {
                    video.complete(final_video_url);
                    ctx.persist_video(&video).await;
                    logger.log_stage(PipelineStage::Completed);
                    self.reporter
                        .report(&GenerationProgress::at(PipelineStage::Completed));

                    let (completed, failed, other) = video.tally();
                    logger.log_completion(&format!(
                        "{completed} segments completed, {failed} failed, {other} unfinished, final video {}",
                        video.final_video_url.as_deref().unwrap_or("none")
                    ));
                    metrics::record_run("completed");
                    self.spawn_mirror(&video);
                    Ok(video)
                }
                Err(e) => {
                    video.fail(e.to_string());
                    ctx.persist_video(&video).await;
                    logger.log_error(&format!("{} ({})", e, e.kind()));
                    metrics::record_run(e.kind().as_str());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Record a story that failed validation as an errored run with no
    /// segments. Stories without an id cannot be stored.
    async fn reject(&self, story: &Story, error: PipelineError) -> PipelineError {
        warn!(story_id = %story.story_id, error = %error, "Story rejected");
        metrics::record_run(error.kind().as_str());
        if story.story_id.trim().is_empty() {
            return error;
        }

        let mut video = GeneratedVideo::from_story(story);
        video.segments.clear();
        video.fail(error.to_string());
        if let Err(e) = self.sink.begin_run(&video).await {
            warn!(story_id = %story.story_id, error = %e, "Failed to persist rejected story");
            metrics::record_persist_failure("run");
        }
        error
    }

    /// Upload the run's assets in a detached task with its own error boundary.
    fn spawn_mirror(&self, video: &GeneratedVideo) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let snapshot = video.clone();
        let span = tracing::info_span!("mirror", story_id = %snapshot.story_id);
        tokio::spawn(
            async move {
                let report = mirror.mirror_video(&snapshot).await;
                info!(
                    uploaded = report.uploaded,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Asset mirror finished"
                );
            }
            .instrument(span),
        );
    }
}

fn validate_story(story: &Story) -> PipelineResult<()> {
    story
        .validate()
        .map_err(|e| PipelineError::invalid_story(e.to_string()))
}

/// Stages in order. Returns the final video URL, if any.
async fn run_stages(
    ctx: &StageContext<'_>,
    video: &mut GeneratedVideo,
    carried_over: Vec<String>,
) -> PipelineResult<Option<String>> {
    ctx.enter_stage(video, PipelineStage::GeneratingVideos).await;
    generate_primary_assets(ctx, video).await?;

    ctx.enter_stage(video, PipelineStage::GeneratingGraphics).await;
    generate_lower_thirds(ctx, video).await?;

    ctx.enter_stage(video, PipelineStage::RemovingBackgrounds).await;
    remove_lower_third_backgrounds(ctx, video, &carried_over).await?;

    ctx.enter_stage(video, PipelineStage::GeneratingVoiceovers).await;
    generate_voiceovers(ctx, video).await?;

    ctx.ensure_not_cancelled()?;
    ctx.enter_stage(video, PipelineStage::Composing).await;
    let engine = CompositionEngine::new(ctx.compositor, ctx.logger).with_already_muxed(carried_over);
    for index in engine.mux_segments(video).await {
        ctx.persist_segment(&video.segments[index]).await;
    }
    ctx.ensure_not_cancelled()?;
    Ok(engine.concat_final(video).await)
}
