//! Maintenance handlers (admin token protected)

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::scheduler::SweepReport;
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use invite_lifecycle::ArchiveSweepSummary;
use serde::{Deserialize, Serialize};

/// Archive request body
#[derive(Debug, Default, Deserialize)]
pub struct ArchiveRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub triggered: bool,
}

const DEFAULT_ARCHIVE_LIMIT: usize = 100;

/// Archive publications whose active life has ended
pub async fn archive_expired(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ArchiveRequest>>,
) -> ApiResult<Json<ArchiveSweepSummary>> {
    state.require_admin(&headers)?;

    let limit = body
        .and_then(|Json(request)| request.limit)
        .unwrap_or(DEFAULT_ARCHIVE_LIMIT)
        .max(1);
    let summary = state.archiver.archive_expired(limit).await?;
    Ok(Json(summary))
}

/// Ask the scheduler for an immediate sweep
pub async fn trigger_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    state.require_admin(&headers)?;

    let triggered = state.scheduler.trigger_sweep();
    tracing::info!(triggered, "Sweep requested");
    Ok((StatusCode::ACCEPTED, Json(TriggerResponse { triggered })))
}

/// Report of the most recent sweep
pub async fn last_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SweepReport>> {
    state.require_admin(&headers)?;

    state
        .scheduler
        .last_sweep()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no sweep has run yet".to_string()))
}
