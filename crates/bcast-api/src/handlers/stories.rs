//! Story runs: start detached, read the persisted state, cancel.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bcast_models::{GeneratedVideo, Story};
use bcast_providers::CancelSignal;
use bcast_worker::VideoPipeline;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartStoryQuery {
    /// Keep segments completed by the last persisted run of this story.
    #[serde(default)]
    pub resume: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryRunResponse {
    pub story_id: String,
}

/// POST /api/stories
///
/// Validates the story and starts a pipeline run in the background.
pub async fn start_story(
    State(state): State<AppState>,
    Query(query): Query<StartStoryQuery>,
    Json(story): Json<Story>,
) -> ApiResult<(StatusCode, Json<StoryRunResponse>)> {
    let pipeline = state
        .pipeline
        .clone()
        .ok_or_else(|| ApiError::unavailable("story generation is not configured"))?;
    story
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let previous = if query.resume {
        state.sink.load_video(&story.story_id).await?
    } else {
        None
    };

    let cancel = state
        .runs
        .start(&story.story_id)
        .ok_or_else(|| ApiError::conflict(format!("story {} is already running", story.story_id)))?;
    metrics::set_active_story_runs(state.runs.len());

    let story_id = story.story_id.clone();
    let runs = state.runs.clone();
    let span = tracing::info_span!("story_run", story_id = %story_id);
    tokio::spawn(
        async move {
            scopeguard::defer! {
                runs.finish(&story.story_id);
                metrics::set_active_story_runs(runs.len());
            }
            run_story(&pipeline, &story, previous.as_ref(), cancel).await;
        }
        .instrument(span),
    );

    info!(story_id = %story_id, resume = query.resume, "Story run accepted");
    Ok((StatusCode::ACCEPTED, Json(StoryRunResponse { story_id })))
}

async fn run_story(
    pipeline: &VideoPipeline,
    story: &Story,
    previous: Option<&GeneratedVideo>,
    cancel: CancelSignal,
) {
    let result = match previous {
        Some(previous) => pipeline.resume_video(story, previous, cancel).await,
        None => pipeline.generate_video_with_cancel(story, cancel).await,
    };
    match result {
        Ok(video) => {
            info!(
                story_id = %video.story_id,
                final_video_url = video.final_video_url.as_deref().unwrap_or(""),
                "Story run finished"
            );
            metrics::record_story_run("completed");
        }
        Err(e) => {
            warn!(story_id = %story.story_id, error = %e, "Story run failed");
            metrics::record_story_run(e.kind().as_str());
        }
    }
}

/// GET /api/stories/:story_id
pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> ApiResult<Json<GeneratedVideo>> {
    state
        .sink
        .load_video(&story_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("story {story_id}")))
}

/// DELETE /api/stories/:story_id
pub async fn cancel_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> ApiResult<(StatusCode, Json<StoryRunResponse>)> {
    if !state.runs.cancel(&story_id) {
        return Err(ApiError::not_found(format!("no running story {story_id}")));
    }
    info!(story_id = %story_id, "Story run cancellation requested");
    Ok((StatusCode::ACCEPTED, Json(StoryRunResponse { story_id })))
}
