//! Draft and publication lifecycle handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use invite_lifecycle::{
    ArtifactKind, LifecycleView, PauseOutcome, PurgeSummary, RestoreOutcome, ResumeOutcome,
    TrashOutcome,
};
use serde::Deserialize;

/// Purge request body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Current state and key dates of an artifact
pub async fn inspect_artifact(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<LifecycleView>> {
    let view = state
        .lifecycle
        .inspect(kind, &slug, state.caller(&headers))
        .await?;
    Ok(Json(view))
}

/// Move an artifact to the trash
pub async fn move_to_trash(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<TrashOutcome>> {
    let outcome = state
        .lifecycle
        .move_to_trash(kind, &slug, state.caller(&headers))
        .await?;
    Ok(Json(outcome))
}

/// Restore an artifact from the trash
pub async fn restore_from_trash(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<RestoreOutcome>> {
    let outcome = state
        .lifecycle
        .restore_from_trash(kind, &slug, state.caller(&headers))
        .await?;
    Ok(Json(outcome))
}

/// Take a publication offline
pub async fn pause_publication(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<PauseOutcome>> {
    let outcome = state
        .lifecycle
        .pause_publication(&slug, state.caller(&headers))
        .await?;
    Ok(Json(outcome))
}

/// Put a paused publication back online
pub async fn resume_publication(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ResumeOutcome>> {
    let outcome = state
        .lifecycle
        .resume_publication(&slug, state.caller(&headers))
        .await?;
    Ok(Json(outcome))
}

/// Run one retention purge batch for the kind
pub async fn purge_trashed(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    headers: HeaderMap,
    body: Option<Json<PurgeRequest>>,
) -> ApiResult<Json<PurgeSummary>> {
    state.require_admin(&headers)?;

    let request = body.map(|Json(request)| request).unwrap_or_default();
    let summary = state.purge.purge_trashed(kind, request.batch_size).await?;
    Ok(Json(summary))
}
