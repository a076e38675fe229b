//! In-process tests of the REST surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use invite_daemon::config::DaemonConfig;
use invite_daemon::{Backends, Server};
use invite_lifecycle::{
    ArtifactKind, ArtifactRecord, ArtifactState, BlobStore, DocumentStore, InMemoryBlobStore,
    InMemoryDocumentStore, InMemoryHistoryStore, ManualClock,
};
use serde_json::Value;
use tower::ServiceExt;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap()
}

struct TestApp {
    router: Router,
    documents: Arc<InMemoryDocumentStore>,
    blobs: Arc<InMemoryBlobStore>,
    clock: Arc<ManualClock>,
}

fn app_with(config: DaemonConfig) -> TestApp {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let backends = Backends {
        documents: documents.clone(),
        blobs: blobs.clone(),
        history: Arc::new(InMemoryHistoryStore::new()),
        clock: clock.clone(),
    };
    let server = Server::with_backends(config, backends).unwrap();
    TestApp {
        router: server.router(),
        documents,
        blobs,
        clock,
    }
}

fn app() -> TestApp {
    app_with(DaemonConfig::default())
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let resp = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_returns_200() {
    let app = app();
    let (status, json) = send(&app, "GET", "/api/v1/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn trash_and_restore_draft() {
    let app = app();
    app.documents
        .insert(ArtifactKind::Draft, ArtifactRecord::new("a1", "u1"))
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/drafts/a1/trash",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["state"], "trash");
    assert_eq!(json["trashedAt"], "2025-02-01T10:00:00.000Z");
    assert_eq!(json["purgeAt"], "2025-03-03T10:00:00.000Z");

    let (_, again) = send(
        &app,
        "POST",
        "/api/v1/drafts/a1/trash",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(again["alreadyInTrash"], true);
    assert_eq!(again["purgeAt"], json["purgeAt"]);

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/drafts/a1/restore",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "active");
}

#[tokio::test]
async fn error_taxonomy_maps_to_status_codes() {
    let app = app();
    app.documents
        .insert(ArtifactKind::Publication, ArtifactRecord::new("p1", "u1"))
        .await
        .unwrap();

    let (status, json) = send(&app, "POST", "/api/v1/publications/p1/trash", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "unauthenticated");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/publications/p1/trash",
        &[("x-caller-id", "u2")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/publications/ghost/trash",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/publications/p1/trash",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["code"], "failed-precondition");
}

#[tokio::test]
async fn publication_pause_trash_restore() {
    let app = app();
    app.documents
        .insert(ArtifactKind::Publication, ArtifactRecord::new("p1", "u1"))
        .await
        .unwrap();
    let caller = [("x-caller-id", "u1")];

    let (status, json) = send(&app, "POST", "/api/v1/publications/p1/pause", &caller, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "paused");

    let (status, _) = send(&app, "POST", "/api/v1/publications/p1/trash", &caller, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "POST", "/api/v1/publications/p1/restore", &caller, None).await;
    assert_eq!(json["state"], "paused");

    let (_, json) = send(&app, "GET", "/api/v1/publications/p1", &caller, None).await;
    assert_eq!(json["state"], "paused");
    assert!(json["trashedAt"].is_null());
}

#[tokio::test]
async fn purge_endpoint_returns_summary() {
    let app = app();
    let mut record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Trash);
    record.trashed_at = Some(t0().into());
    app.documents
        .insert(ArtifactKind::Draft, record)
        .await
        .unwrap();
    app.blobs.put("drafts/a1/page.png", vec![1]).await.unwrap();
    app.clock.advance(Duration::days(30));

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/drafts/purge",
        &[],
        Some(serde_json::json!({ "batchSize": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scanned"], 1);
    assert_eq!(json["deleted"], 1);
    assert_eq!(json["skippedPending"], 0);
    assert_eq!(json["skippedInvalid"], 0);
    assert_eq!(json["errors"], 0);
    assert!(!app.documents.contains(ArtifactKind::Draft, "a1").await);
}

#[tokio::test]
async fn purge_requires_admin_token_when_configured() {
    let mut config = DaemonConfig::default();
    config.auth.admin_token = Some("s3cret".to_string());
    let app = app_with(config);

    let (status, _) = send(&app, "POST", "/api/v1/drafts/purge", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/drafts/purge",
        &[("x-admin-token", "wrong")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/drafts/purge",
        &[("x-admin-token", "s3cret")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scanned"], 0);
}

#[tokio::test]
async fn custom_caller_header_is_honoured() {
    let mut config = DaemonConfig::default();
    config.auth.caller_header = "x-user".to_string();
    let app = app_with(config);
    app.documents
        .insert(ArtifactKind::Draft, ArtifactRecord::new("a1", "u1"))
        .await
        .unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/drafts/a1/trash",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/drafts/a1/trash",
        &[("x-user", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn archive_endpoint_detaches_expired_publications() {
    let app = app();
    app.documents
        .insert(
            ArtifactKind::Publication,
            ArtifactRecord::new("p1", "u1").with_expires_at(t0() - Duration::days(1)),
        )
        .await
        .unwrap();

    let (status, json) = send(&app, "POST", "/api/v1/publications/archive", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["archived"], 1);

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/publications/p1/resume",
        &[("x-caller-id", "u1")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["code"], "failed-precondition");
}
