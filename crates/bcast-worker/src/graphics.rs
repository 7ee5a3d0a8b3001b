//! Lower-third graphics and their background removal.
//!
//! Neither step changes a segment's status; a failed graphic is logged and
//! the segment carries on without it.

use bcast_models::{AssetKind, GeneratedVideo, PipelineStage, SegmentStatus};
use bcast_providers::BackgroundRemovalRequest;
use bcast_storage::AssetName;
use tracing::{debug, info};

use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use crate::prompt::build_lower_third_request;

/// Generate an overlay for every segment that asks for one.
pub async fn generate_lower_thirds(ctx: &StageContext<'_>, video: &mut GeneratedVideo) -> PipelineResult<()> {
    for segment in video.segments.iter_mut() {
        let Some(lower_third) = segment.segment.lower_third.clone() else {
            continue;
        };
        if segment.status == SegmentStatus::Error || segment.lower_third_url.is_some() {
            continue;
        }
        ctx.ensure_not_cancelled()?;
        ctx.report_segment(PipelineStage::GeneratingGraphics, segment.id());

        let request = build_lower_third_request(&lower_third, ctx.config);
        let name = AssetName::custom(
            AssetKind::Image,
            format!("{}_{}_lower_third", ctx.story_id(), segment.id()),
        );

        let result = async {
            let asset = ctx.providers.lower_thirds.generate(&request, ctx.cancel).await?;
            Ok::<_, PipelineError>(ctx.store.store(asset, &name).await?)
        }
        .await;

        match result {
            Ok(url) => {
                info!(story_id = %ctx.story_id(), segment_id = segment.id(), url = %url, "Lower third generated");
                segment.lower_third_url = Some(url);
                metrics::record_graphic("lower_third", "completed");
                ctx.persist_segment(segment).await;
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                ctx.logger
                    .log_warning(&format!("lower third failed for {}: {}", segment.id(), e));
                metrics::record_graphic("lower_third", "failed");
            }
        }
    }
    Ok(())
}

/// Replace every lower third with a transparent-background version.
///
/// Skipped when no remover is configured or the feature is disabled.
/// Segments in `carried_over` already went through removal in an earlier
/// run. A segment whose removal fails keeps its original graphic.
pub async fn remove_lower_third_backgrounds(
    ctx: &StageContext<'_>,
    video: &mut GeneratedVideo,
    carried_over: &[String],
) -> PipelineResult<()> {
    let Some(remover) = ctx.providers.background_remover.as_ref() else {
        debug!(story_id = %ctx.story_id(), "No background remover configured");
        return Ok(());
    };
    if !ctx.config.remove_lower_third_backgrounds {
        return Ok(());
    }

    for segment in video.segments.iter_mut() {
        let Some(image_url) = segment.lower_third_url.clone() else {
            continue;
        };
        if carried_over.iter().any(|id| id == segment.id()) {
            debug!(story_id = %ctx.story_id(), segment_id = segment.id(), "Lower third already cleaned");
            continue;
        }
        ctx.ensure_not_cancelled()?;
        ctx.report_segment(PipelineStage::RemovingBackgrounds, segment.id());

        let request = BackgroundRemovalRequest { image_url };
        let name = AssetName::custom(
            AssetKind::Image,
            format!("{}_{}_lower_third_clean", ctx.story_id(), segment.id()),
        );
        let result = async {
            let asset = remover.generate(&request, ctx.cancel).await?;
            Ok::<_, PipelineError>(ctx.store.store(asset, &name).await?)
        }
        .await;

        match result {
            Ok(url) => {
                segment.lower_third_url = Some(url);
                metrics::record_graphic("background_removal", "completed");
                ctx.persist_segment(segment).await;
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                ctx.logger.log_warning(&format!(
                    "background removal failed for {}, keeping original: {}",
                    segment.id(),
                    e
                ));
                metrics::record_graphic("background_removal", "failed");
            }
        }
    }
    Ok(())
}
