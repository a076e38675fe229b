//! Application state for API handlers

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use crate::scheduler::Scheduler;
use axum::http::HeaderMap;
use invite_lifecycle::{HistoryArchiver, LifecycleService, RetentionPurgeJob};
use std::sync::Arc;

/// Header carrying the maintenance token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Transition handlers
    pub lifecycle: LifecycleService,

    /// Retention purge job
    pub purge: RetentionPurgeJob,

    /// History archival
    pub archiver: HistoryArchiver,

    /// Scheduler handle
    pub scheduler: Arc<Scheduler>,

    /// Caller identity and admin access
    pub auth: Arc<AuthConfig>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        lifecycle: LifecycleService,
        purge: RetentionPurgeJob,
        archiver: HistoryArchiver,
        scheduler: Arc<Scheduler>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            lifecycle,
            purge,
            archiver,
            scheduler,
            auth: Arc::new(auth),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Caller id from the trusted identity header, if present.
    ///
    /// The header is taken at face value. The daemon must only be reachable
    /// through the authenticating proxy, and that proxy must drop any
    /// client-supplied copy of the header before setting its own.
    pub fn caller<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(self.auth.caller_header.as_str())
            .and_then(|value| value.to_str().ok())
    }

    /// Check the maintenance token when one is configured.
    pub fn require_admin(&self, headers: &HeaderMap) -> ApiResult<()> {
        let Some(expected) = self.auth.admin_token.as_deref() else {
            return Ok(());
        };

        match headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(token) if tokens_match(token, expected) => Ok(()),
            Some(_) => Err(ApiError::Forbidden("invalid admin token".to_string())),
            None => Err(ApiError::Unauthenticated(format!(
                "{} header is required",
                ADMIN_TOKEN_HEADER
            ))),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}

/// Digest comparison; `blake3::Hash` equality is constant-time.
fn tokens_match(presented: &str, expected: &str) -> bool {
    blake3::hash(presented.as_bytes()) == blake3::hash(expected.as_bytes())
}
