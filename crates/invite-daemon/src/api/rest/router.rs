//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use invite_lifecycle::ArtifactKind;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Routes shared by both artifact kinds
fn artifact_routes(kind: ArtifactKind) -> Router<AppState> {
    Router::new()
        .route("/:slug", get(handlers::inspect_artifact))
        .route("/:slug/trash", post(handlers::move_to_trash))
        .route("/:slug/restore", post(handlers::restore_from_trash))
        .route("/purge", post(handlers::purge_trashed))
        .layer(Extension(kind))
}

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let publications = artifact_routes(ArtifactKind::Publication)
        .route("/:slug/pause", post(handlers::pause_publication))
        .route("/:slug/resume", post(handlers::resume_publication))
        .route("/archive", post(handlers::archive_expired));

    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/maintenance/sweep", post(handlers::trigger_sweep))
        .route("/maintenance/last-sweep", get(handlers::last_sweep))
        // Artifacts
        .nest(
            &format!("/{}", ArtifactKind::Draft.collection()),
            artifact_routes(ArtifactKind::Draft),
        )
        .nest(
            &format!("/{}", ArtifactKind::Publication.collection()),
            publications,
        );

    // Build router with middleware
    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
