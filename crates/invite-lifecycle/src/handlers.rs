//! Transition Handlers
//!
//! Idempotent mutations behind the guard. Each handler touches exactly one
//! document with one conditional merge write keyed on the `updatedAt` it read.
//! A writer that loses a race re-reads and decides again, so a repeated or
//! concurrent call finds the artifact already in its target state and reports
//! the stored timestamps.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::error::{LifecycleError, LifecycleResult, StorageError};
use crate::guard::{AuthorizedArtifact, GuardDecision, Transition, TransitionGuard};
use crate::model::{ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, FieldChange};
use crate::resolver::{self, LifecycleView};
use crate::store::DocumentStore;

/// Result of `moveToTrash`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashOutcome {
    pub success: bool,
    pub slug: String,
    pub state: ArtifactState,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub trashed_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub purge_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_in_trash: bool,
}

/// Result of `restoreFromTrash`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub success: bool,
    pub slug: String,
    pub state: ArtifactState,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_restored: bool,
}

/// Result of `pausePublication`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOutcome {
    pub success: bool,
    pub slug: String,
    pub state: ArtifactState,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_paused: bool,
}

/// Result of `resumePublication`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeOutcome {
    pub success: bool,
    pub slug: String,
    pub state: ArtifactState,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_active: bool,
}

/// Trash, restore, pause and resume handlers.
#[derive(Clone)]
pub struct LifecycleService {
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    guard: TransitionGuard,
}

impl LifecycleService {
    pub fn new(documents: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        let guard = TransitionGuard::new(documents.clone());
        Self {
            documents,
            clock,
            guard,
        }
    }

    /// Move a Draft (from `Active`) or a Publication (from `Paused`) to the
    /// trash and schedule its permanent deletion.
    #[instrument(skip(self, caller), fields(kind = %kind, slug = %slug))]
    pub async fn move_to_trash(
        &self,
        kind: ArtifactKind,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<TrashOutcome> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let artifact = self.guard.authorize(kind, slug, caller).await?;

            let from = match self.guard.check(&artifact, Transition::MoveToTrash, now)? {
                GuardDecision::AlreadyInTarget => {
                    debug!(slug = %artifact.record.slug, "Already in trash");
                    return Ok(TrashOutcome {
                        success: true,
                        slug: artifact.record.slug.clone(),
                        state: ArtifactState::Trash,
                        trashed_at: resolver::trashed_at(&artifact.record),
                        purge_at: resolver::compute_purge_deadline(&artifact.record),
                        already_in_trash: true,
                    });
                }
                GuardDecision::Apply { from } => from,
            };

            let purge_at = resolver::trash_entry_deadline(kind, &artifact.record, now);
            let patch = ArtifactPatch {
                state: FieldChange::Set(ArtifactState::Trash),
                trashed_at: FieldChange::Set(now),
                purge_at: FieldChange::Set(purge_at),
                ..Default::default()
            };
            let Some(stored) = self.write(&artifact, &patch, attempt).await? else {
                continue;
            };

            info!(
                slug = %stored.slug,
                from = %from,
                purge_at = %purge_at,
                caller = %artifact.caller,
                "Moved to trash"
            );

            return Ok(TrashOutcome {
                success: true,
                slug: stored.slug,
                state: ArtifactState::Trash,
                trashed_at: Some(now),
                purge_at: Some(purge_at),
                already_in_trash: false,
            });
        }
        Err(contended(kind, slug))
    }

    /// Undo a trash action. Drafts come back `Active`; publications come back
    /// `Paused` and must be resumed deliberately.
    #[instrument(skip(self, caller), fields(kind = %kind, slug = %slug))]
    pub async fn restore_from_trash(
        &self,
        kind: ArtifactKind,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<RestoreOutcome> {
        let target = Transition::Restore.target(kind);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let artifact = self.guard.authorize(kind, slug, caller).await?;

            if let GuardDecision::AlreadyInTarget =
                self.guard.check(&artifact, Transition::Restore, now)?
            {
                debug!(slug = %artifact.record.slug, "Already restored");
                return Ok(RestoreOutcome {
                    success: true,
                    slug: artifact.record.slug.clone(),
                    state: target,
                    already_restored: true,
                });
            }

            let mut patch = ArtifactPatch {
                state: FieldChange::Set(target),
                trashed_at: FieldChange::Delete,
                purge_at: FieldChange::Delete,
                ..Default::default()
            };
            if target == ArtifactState::Paused && resolver::paused_at(&artifact.record).is_none() {
                patch.paused_at = FieldChange::Set(now);
            }
            let Some(stored) = self.write(&artifact, &patch, attempt).await? else {
                continue;
            };

            info!(
                slug = %stored.slug,
                to = %target,
                caller = %artifact.caller,
                "Restored from trash"
            );

            return Ok(RestoreOutcome {
                success: true,
                slug: stored.slug,
                state: target,
                already_restored: false,
            });
        }
        Err(contended(kind, slug))
    }

    /// Take a live publication offline without trashing it.
    #[instrument(skip(self, caller), fields(slug = %slug))]
    pub async fn pause_publication(
        &self,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<PauseOutcome> {
        let kind = ArtifactKind::Publication;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let artifact = self.guard.authorize(kind, slug, caller).await?;

            if let GuardDecision::AlreadyInTarget =
                self.guard.check(&artifact, Transition::Pause, now)?
            {
                return Ok(PauseOutcome {
                    success: true,
                    slug: artifact.record.slug.clone(),
                    state: ArtifactState::Paused,
                    paused_at: resolver::paused_at(&artifact.record),
                    already_paused: true,
                });
            }

            let patch = ArtifactPatch {
                state: FieldChange::Set(ArtifactState::Paused),
                paused_at: FieldChange::Set(now),
                ..Default::default()
            };
            let Some(stored) = self.write(&artifact, &patch, attempt).await? else {
                continue;
            };
            info!(slug = %stored.slug, caller = %artifact.caller, "Publication paused");

            return Ok(PauseOutcome {
                success: true,
                slug: stored.slug,
                state: ArtifactState::Paused,
                paused_at: Some(now),
                already_paused: false,
            });
        }
        Err(contended(kind, slug))
    }

    /// Put a paused publication back online, unless it has expired.
    #[instrument(skip(self, caller), fields(slug = %slug))]
    pub async fn resume_publication(
        &self,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<ResumeOutcome> {
        let kind = ArtifactKind::Publication;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let artifact = self.guard.authorize(kind, slug, caller).await?;

            if let GuardDecision::AlreadyInTarget =
                self.guard.check(&artifact, Transition::Resume, now)?
            {
                return Ok(ResumeOutcome {
                    success: true,
                    slug: artifact.record.slug.clone(),
                    state: ArtifactState::Active,
                    already_active: true,
                });
            }

            let patch = ArtifactPatch {
                state: FieldChange::Set(ArtifactState::Active),
                paused_at: FieldChange::Delete,
                ..Default::default()
            };
            let Some(stored) = self.write(&artifact, &patch, attempt).await? else {
                continue;
            };
            info!(slug = %stored.slug, caller = %artifact.caller, "Publication resumed");

            return Ok(ResumeOutcome {
                success: true,
                slug: stored.slug,
                state: ArtifactState::Active,
                already_active: false,
            });
        }
        Err(contended(kind, slug))
    }

    /// Owner-only read of an artifact's canonical state and key dates.
    pub async fn inspect(
        &self,
        kind: ArtifactKind,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<LifecycleView> {
        let artifact = self.guard.authorize(kind, slug, caller).await?;
        Ok(resolver::describe(kind, &artifact.record, self.clock.now()))
    }

    /// Conditional write against the `updatedAt` the guard read.
    ///
    /// `None` means another writer changed the record first; the caller
    /// re-reads and decides again.
    async fn write(
        &self,
        artifact: &AuthorizedArtifact,
        patch: &ArtifactPatch,
        attempt: usize,
    ) -> LifecycleResult<Option<ArtifactRecord>> {
        match self
            .documents
            .merge_if_unchanged(
                artifact.kind,
                &artifact.record.slug,
                artifact.record.updated_at.as_ref(),
                patch,
            )
            .await
        {
            Ok(stored) => Ok(Some(stored)),
            Err(StorageError::Conflict(reason)) => {
                debug!(slug = %artifact.record.slug, attempt, %reason, "Lost write race, re-reading");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Attempts per transition before a contended record is reported as an error.
const MAX_WRITE_ATTEMPTS: usize = 5;

fn contended(kind: ArtifactKind, slug: &str) -> LifecycleError {
    LifecycleError::Internal(format!(
        "{} {} kept changing during the update; retry later",
        kind, slug
    ))
}
