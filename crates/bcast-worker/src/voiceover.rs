//! Stage three: narration audio for voiceover segments.

use std::time::Instant;

use bcast_models::{AssetKind, GeneratedVideo, PipelineStage, SegmentKind, SegmentStatus, VideoSegment};
use bcast_storage::AssetName;
use tracing::info;

use crate::context::StageContext;
use crate::error::PipelineResult;
use crate::metrics;
use crate::prompt::build_speech_request;

const STAGE: &str = "voiceovers";

/// Synthesize speech for every voiceover segment still in flight.
///
/// Segments with footage from stage one are already `generating`; the rest
/// enter `generating` here. Either way they end `completed` or `error`.
pub async fn generate_voiceovers(ctx: &StageContext<'_>, video: &mut GeneratedVideo) -> PipelineResult<()> {
    let started = Instant::now();

    for segment in video.segments.iter_mut() {
        if segment.segment.kind != SegmentKind::Voiceover || segment.status.is_terminal() {
            continue;
        }
        ctx.ensure_not_cancelled()?;

        if segment.status == SegmentStatus::Pending {
            segment.mark_generating()?;
            ctx.logger.log_segment(segment.id(), segment.status, None);
            ctx.persist_segment(segment).await;
        }
        ctx.report_segment(PipelineStage::GeneratingVoiceovers, segment.id());

        match synthesize(ctx, segment).await {
            Ok(()) => {
                segment.complete()?;
                ctx.logger.log_segment(segment.id(), segment.status, None);
                metrics::record_segment(STAGE, SegmentKind::Voiceover.as_str(), "completed");
                ctx.persist_segment(segment).await;
            }
            Err(e) => {
                let message = e.to_string();
                segment.fail(&message)?;
                ctx.logger.log_segment(segment.id(), segment.status, Some(&message));
                metrics::record_segment(STAGE, SegmentKind::Voiceover.as_str(), e.kind().as_str());
                ctx.persist_segment(segment).await;
                if e.is_cancelled() {
                    return Err(e);
                }
            }
        }
    }

    metrics::record_stage_duration(STAGE, started.elapsed().as_secs_f64());
    Ok(())
}

async fn synthesize(ctx: &StageContext<'_>, segment: &mut VideoSegment) -> PipelineResult<()> {
    let request = build_speech_request(&segment.segment, ctx.config)?;
    info!(
        story_id = %ctx.story_id(),
        segment_id = segment.id(),
        provider = ctx.providers.speech.provider_name(),
        chars = request.text.len(),
        "Generating voiceover"
    );

    let asset = ctx.providers.speech.generate(&request, ctx.cancel).await?;
    let name = AssetName::segment(AssetKind::Audio, ctx.story_id(), segment.id());
    segment.audio_url = Some(ctx.store.store(asset, &name).await?);
    Ok(())
}
