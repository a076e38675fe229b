//! History Archival
//!
//! Finalized publications are mirrored into an append-only history set and
//! then detached from the live collection. No transaction spans both stores,
//! so the protocol is two-phase and at-least-once:
//!
//! 1. append a reduced copy to history (new id, tagged with the origin slug),
//! 2. only once the copy is confirmed, mark the live record as archived and
//!    put it in the trash with a deadline so the purge job removes it.
//!
//! A crash between the phases leaves the live record untouched; the next run
//! copies it again. History entries are additive, so the duplicate is harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::HistoryConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::guard::require_slug;
use crate::model::{
    ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, FieldChange, HistoryRecord,
    HISTORY_SOURCE_MARKER,
};
use crate::resolver::{self, expires_at, is_effectively_finalized};
use crate::store::{DocumentStore, HistoryStore};

/// Result of archiving one publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    pub slug: String,
    /// Id of the history entry written by this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub purge_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_archived: bool,
}

/// Counters of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSweepSummary {
    pub scanned: usize,
    pub archived: usize,
    pub errors: usize,
}

/// Copies finalized publications into history and detaches them.
#[derive(Clone)]
pub struct HistoryArchiver {
    documents: Arc<dyn DocumentStore>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    config: HistoryConfig,
}

impl HistoryArchiver {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            documents,
            history,
            clock,
            config,
        }
    }

    /// Archive one effectively finalized publication.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn archive(&self, slug: &str) -> LifecycleResult<ArchiveOutcome> {
        let kind = ArtifactKind::Publication;
        let slug = require_slug(slug)?;
        let now = self.clock.now();

        let record = self
            .documents
            .get(kind, slug)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("{} {} not found", kind, slug)))?;

        if record.is_archived() {
            debug!(slug = %slug, "Already archived");
            return Ok(ArchiveOutcome {
                slug: record.slug.clone(),
                history_id: None,
                purge_at: resolver::compute_purge_deadline(&record),
                already_archived: true,
            });
        }

        if !is_effectively_finalized(kind, &record, now) {
            return Err(LifecycleError::FailedPrecondition(format!(
                "{} {} is not finalized",
                kind, slug
            )));
        }

        // Phase 1: copy
        let entry = self.history_entry(&record, now);
        let history_id = entry.id.clone();
        self.history.append(entry).await.map_err(|e| {
            error!(slug = %slug, error = %e, "Failed to copy publication into history");
            LifecycleError::from(e)
        })?;

        // Phase 2: detach
        let purge_at = resolver::trash_entry_deadline(kind, &record, now);
        let patch = ArtifactPatch {
            state: FieldChange::Set(ArtifactState::Trash),
            trashed_at: FieldChange::Set(now),
            purge_at: FieldChange::Set(purge_at),
            source: FieldChange::Set(HISTORY_SOURCE_MARKER.to_string()),
            ..Default::default()
        };
        self.documents.merge(kind, slug, &patch).await.map_err(|e| {
            warn!(
                slug = %slug,
                history_id = %history_id,
                error = %e,
                "Copied into history but failed to detach; a retry will copy again"
            );
            LifecycleError::from(e)
        })?;

        info!(slug = %slug, history_id = %history_id, purge_at = %purge_at, "Archived publication");

        Ok(ArchiveOutcome {
            slug: record.slug,
            history_id: Some(history_id),
            purge_at: Some(purge_at),
            already_archived: false,
        })
    }

    /// Archive up to `limit` publications whose active life has ended.
    ///
    /// Per-item failures are counted and logged; only a failed candidate
    /// query is returned as an error.
    #[instrument(skip(self))]
    pub async fn archive_expired(&self, limit: usize) -> LifecycleResult<ArchiveSweepSummary> {
        let kind = ArtifactKind::Publication;
        let now = self.clock.now();
        let mut summary = ArchiveSweepSummary::default();

        // Explicitly finalized records first, then live ones whose expiry has
        // passed. The expiry filter runs in the store so unexpired records
        // never crowd candidates out of a page.
        let mut candidates = self
            .documents
            .query_by_state(kind, ArtifactState::Finalized, limit)
            .await?;
        for state in [ArtifactState::Active, ArtifactState::Paused] {
            let remaining = limit.saturating_sub(candidates.len());
            if remaining == 0 {
                break;
            }
            let page = self
                .documents
                .query_expired(kind, state, now, remaining)
                .await?;
            candidates.extend(page);
        }
        candidates.retain(|record| is_effectively_finalized(kind, record, now));

        summary.scanned = candidates.len();
        for record in candidates {
            match self.archive(&record.slug).await {
                Ok(outcome) if !outcome.already_archived => summary.archived += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(slug = %record.slug, error = %e, "Failed to archive expired publication");
                    summary.errors += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            archived = summary.archived,
            errors = summary.errors,
            "Archive sweep complete"
        );
        Ok(summary)
    }

    fn history_entry(&self, record: &ArtifactRecord, now: DateTime<Utc>) -> HistoryRecord {
        let mut payload = Map::new();
        for field in &self.config.retained_fields {
            if let Some(value) = record.extra.get(field) {
                payload.insert(field.clone(), value.clone());
            }
        }
        payload.insert(
            "state".to_string(),
            Value::String(ArtifactState::Finalized.as_str().to_string()),
        );

        HistoryRecord {
            id: Uuid::new_v4().to_string(),
            origin_slug: record.slug.clone(),
            owner_id: record.owner().map(str::to_string),
            expires_at: expires_at(record),
            archived_at: now,
            payload,
        }
    }
}
