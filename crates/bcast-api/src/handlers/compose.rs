//! Composition endpoints: `/api/compose/{mux,snapshot,concat}`.
//!
//! Bodies are camelCase JSON. Inputs are URLs the compositor can read;
//! outputs land in the served asset directory.

use axum::extract::State;
use axum::Json;
use bcast_worker::{
    ConcatRequest, ConcatResponse, MuxRequest, MuxResponse, PipelineResult, SnapshotRequest,
    SnapshotResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

/// Caller's output name, or a fresh `<prefix>_<uuid>`.
fn out_name(requested: Option<String>, prefix: &str) -> String {
    requested
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{prefix}_{}", Uuid::new_v4().simple()))
}

fn finish(operation: &str, result: PipelineResult<String>) -> ApiResult<String> {
    match result {
        Ok(url) => {
            metrics::record_compose_request(operation, "ok");
            Ok(url)
        }
        Err(e) => {
            metrics::record_compose_request(operation, e.kind().as_str());
            Err(e.into())
        }
    }
}

/// POST /api/compose/mux
pub async fn mux(
    State(state): State<AppState>,
    Json(request): Json<MuxRequest>,
) -> ApiResult<Json<MuxResponse>> {
    let video_url = required(request.video_url, "videoUrl")?;
    let audio_url = required(request.audio_url, "audioUrl")?;
    let out_name = out_name(request.out_name, "muxed");

    let muxed_url = finish(
        "mux",
        state.compositor.mux(&video_url, &audio_url, &out_name).await,
    )?;
    info!(out_name = %out_name, url = %muxed_url, "Mux complete");
    Ok(Json(MuxResponse { muxed_url }))
}

/// POST /api/compose/snapshot
pub async fn snapshot(
    State(state): State<AppState>,
    Json(request): Json<SnapshotRequest>,
) -> ApiResult<Json<SnapshotResponse>> {
    let video_url = required(request.video_url, "videoUrl")?;
    let out_name = out_name(request.out_name, "snapshot");

    let image_url = finish(
        "snapshot",
        state.compositor.snapshot(&video_url, &out_name).await,
    )?;
    Ok(Json(SnapshotResponse { image_url }))
}

/// POST /api/compose/concat
pub async fn concat(
    State(state): State<AppState>,
    Json(request): Json<ConcatRequest>,
) -> ApiResult<Json<ConcatResponse>> {
    let videos: Vec<String> = request
        .videos
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if videos.is_empty() {
        return Err(ApiError::bad_request("videos must be a non-empty array"));
    }
    let out_name = out_name(request.out_name, "final");

    let final_url = finish("concat", state.compositor.concat(&videos, &out_name).await)?;
    info!(parts = videos.len(), url = %final_url, "Concat complete");
    Ok(Json(ConcatResponse { final_url }))
}
