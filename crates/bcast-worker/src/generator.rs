//! Stage one: primary footage for every segment.
//!
//! On-camera segments go first, then b-roll and narrated footage, each group
//! in story order and one segment at a time. A failure only ever affects its
//! own segment.

use std::time::Instant;

use bcast_models::{
    AssetKind, AssetRef, GeneratedVideo, PipelineStage, SegmentKind, SegmentStatus, VideoSegment,
};
use bcast_storage::AssetName;
use tracing::{debug, info};

use crate::compose::segment_out_name;
use crate::context::StageContext;
use crate::error::PipelineResult;
use crate::metrics;
use crate::prompt::build_video_request;

const STAGE: &str = "videos";

/// Indexes of segments that get footage, on-camera first.
pub fn footage_order(video: &GeneratedVideo) -> Vec<usize> {
    let on_camera = video
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.segment.kind == SegmentKind::OnCamera);
    let b_roll = video
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.segment.wants_broll_footage());
    on_camera.chain(b_roll).map(|(i, _)| i).collect()
}

/// Generate, store and snapshot the primary video of each pending segment.
///
/// Only cancellation and illegal status transitions end the stage early.
pub async fn generate_primary_assets(ctx: &StageContext<'_>, video: &mut GeneratedVideo) -> PipelineResult<()> {
    let started = Instant::now();

    for index in footage_order(video) {
        let segment = &mut video.segments[index];
        if segment.status != SegmentStatus::Pending {
            debug!(segment_id = segment.id(), status = %segment.status, "Skipping segment footage");
            continue;
        }
        ctx.ensure_not_cancelled()?;

        segment.mark_generating()?;
        ctx.logger.log_segment(segment.id(), segment.status, None);
        ctx.persist_segment(segment).await;
        ctx.report_segment(PipelineStage::GeneratingVideos, segment.id());

        let kind = segment.segment.kind;
        match render_footage(ctx, segment).await {
            Ok(()) => {
                // narration still has to be generated
                if kind != SegmentKind::Voiceover {
                    segment.complete()?;
                }
                ctx.logger.log_segment(segment.id(), segment.status, None);
                metrics::record_segment(STAGE, kind.as_str(), "completed");
                ctx.persist_segment(segment).await;
            }
            Err(e) => {
                let message = e.to_string();
                segment.fail(&message)?;
                ctx.logger.log_segment(segment.id(), segment.status, Some(&message));
                metrics::record_segment(STAGE, kind.as_str(), e.kind().as_str());
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

async fn render_footage(ctx: &StageContext<'_>, segment: &mut VideoSegment) -> PipelineResult<()> {
    let request = build_video_request(&segment.segment, ctx.config, ctx.characters)?;
    info!(
        story_id = %ctx.story_id(),
        segment_id = segment.id(),
        provider = ctx.providers.video.provider_name(),
        seconds = request.seconds,
        references = request.reference_images.len(),
        "Generating segment video"
    );

    let asset = ctx.providers.video.generate(&request, ctx.cancel).await?;
    let name = AssetName::segment(AssetKind::Video, ctx.story_id(), segment.id());
    let url = ctx.store.store(asset, &name).await?;
    segment.video_url = Some(url.clone());

    if ctx.config.snapshots {
        capture_poster_frame(ctx, segment, &url).await;
    }
    Ok(())
}

/// Best effort: a missing poster frame never fails the segment.
async fn capture_poster_frame(ctx: &StageContext<'_>, segment: &mut VideoSegment, video_url: &str) {
    let out_name = segment_out_name(ctx.story_id(), segment.id());
    let image_url = match ctx.compositor.snapshot(video_url, &out_name).await {
        Ok(url) => url,
        Err(e) => {
            ctx.logger
                .log_warning(&format!("snapshot failed for {}: {}", segment.id(), e));
            metrics::record_composition("snapshot", "failed");
            return;
        }
    };

    let name = AssetName::custom(AssetKind::Thumbnail, format!("{}-first-frame", segment.id()));
    match ctx.store.store(AssetRef::url(image_url), &name).await {
        Ok(stored) => {
            segment.first_frame_image_url = Some(stored);
            metrics::record_composition("snapshot", "completed");
        }
        Err(e) => {
            ctx.logger
                .log_warning(&format!("storing snapshot failed for {}: {}", segment.id(), e));
            metrics::record_composition("snapshot", "failed");
        }
    }
}
