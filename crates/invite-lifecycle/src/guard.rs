//! Transition Guard
//!
//! Every mutating operation runs the same pipeline before it may write:
//!
//! 1. the caller identity must be present,
//! 2. the artifact must exist and belong to the caller (one read),
//! 3. the transition must be legal from the current state, or the artifact
//!    must already be in the target state (idempotent success).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::migration::normalization_patch;
use crate::model::{ArtifactKind, ArtifactRecord, ArtifactState};
use crate::resolver::{is_effectively_finalized, resolve_state};
use crate::store::DocumentStore;

/// A requested state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    MoveToTrash,
    Restore,
    Pause,
    Resume,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::MoveToTrash => "move to trash",
            Transition::Restore => "restore",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
        }
    }

    /// Whether the transition exists for the kind at all.
    pub fn applies_to(&self, kind: ArtifactKind) -> bool {
        match self {
            Transition::MoveToTrash | Transition::Restore => true,
            Transition::Pause | Transition::Resume => kind == ArtifactKind::Publication,
        }
    }

    /// State the artifact ends up in.
    ///
    /// Restoring a publication never republishes it.
    pub fn target(&self, kind: ArtifactKind) -> ArtifactState {
        match (self, kind) {
            (Transition::MoveToTrash, _) => ArtifactState::Trash,
            (Transition::Restore, ArtifactKind::Draft) => ArtifactState::Active,
            (Transition::Restore, ArtifactKind::Publication) => ArtifactState::Paused,
            (Transition::Pause, _) => ArtifactState::Paused,
            (Transition::Resume, _) => ArtifactState::Active,
        }
    }

    /// States from which the transition may be applied.
    pub fn legal_sources(&self, kind: ArtifactKind) -> &'static [ArtifactState] {
        match (self, kind) {
            (Transition::MoveToTrash, ArtifactKind::Draft) => &[ArtifactState::Active],
            (Transition::MoveToTrash, ArtifactKind::Publication) => &[ArtifactState::Paused],
            (Transition::Restore, _) => &[ArtifactState::Trash],
            (Transition::Pause, ArtifactKind::Publication) => &[ArtifactState::Active],
            (Transition::Resume, ArtifactKind::Publication) => &[ArtifactState::Paused],
            (Transition::Pause | Transition::Resume, ArtifactKind::Draft) => &[],
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the legality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Write the transition.
    Apply { from: ArtifactState },
    /// Nothing to write; report the existing timestamps.
    AlreadyInTarget,
}

/// An artifact whose caller has been authenticated and proven to own it.
#[derive(Debug, Clone)]
pub struct AuthorizedArtifact {
    pub kind: ArtifactKind,
    pub caller: String,
    pub record: ArtifactRecord,
}

/// Caller identity check.
pub fn require_caller(caller: Option<&str>) -> LifecycleResult<&str> {
    match caller.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(LifecycleError::Unauthenticated(
            "caller identity is required".to_string(),
        )),
    }
}

/// Slug presence and shape check.
///
/// The slug doubles as a blob-store path segment, so separators are refused.
pub fn require_slug(slug: &str) -> LifecycleResult<&str> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(LifecycleError::InvalidArgument("slug is required".to_string()));
    }
    if slug.contains('/') || slug.contains('\\') || slug == "." || slug == ".." {
        return Err(LifecycleError::InvalidArgument(format!(
            "malformed slug: {}",
            slug
        )));
    }
    Ok(slug)
}

/// Validates callers, ownership and transition legality.
#[derive(Clone)]
pub struct TransitionGuard {
    documents: Arc<dyn DocumentStore>,
}

impl TransitionGuard {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Authenticate, load and check ownership in a single read.
    ///
    /// Legacy records are normalized on the way through; a failed
    /// normalization write is logged and otherwise ignored.
    pub async fn authorize(
        &self,
        kind: ArtifactKind,
        slug: &str,
        caller: Option<&str>,
    ) -> LifecycleResult<AuthorizedArtifact> {
        let caller = require_caller(caller)?;
        let slug = require_slug(slug)?;

        let record = self
            .documents
            .get(kind, slug)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("{} {} not found", kind, slug)))?;

        if record.owner() != Some(caller) {
            return Err(LifecycleError::PermissionDenied(format!(
                "{} {} does not belong to the caller",
                kind, slug
            )));
        }

        let record = match normalization_patch(kind, &record) {
            Some(patch) => match self
                .documents
                .merge_if_unchanged(kind, slug, record.updated_at.as_ref(), &patch)
                .await
            {
                Ok(normalized) => {
                    debug!(kind = %kind, slug = %slug, "Normalized legacy record");
                    normalized
                }
                Err(e) => {
                    warn!(
                        kind = %kind,
                        slug = %slug,
                        error = %e,
                        "Failed to normalize legacy record"
                    );
                    record
                }
            },
            None => record,
        };

        Ok(AuthorizedArtifact {
            kind,
            caller: caller.to_string(),
            record,
        })
    }

    /// Decide whether `transition` may be applied at `now`.
    pub fn check(
        &self,
        artifact: &AuthorizedArtifact,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> LifecycleResult<GuardDecision> {
        check_transition(artifact.kind, &artifact.record, transition, now)
    }
}

/// Pure legality check shared by the guard and its tests.
pub fn check_transition(
    kind: ArtifactKind,
    record: &ArtifactRecord,
    transition: Transition,
    now: DateTime<Utc>,
) -> LifecycleResult<GuardDecision> {
    if !transition.applies_to(kind) {
        return Err(LifecycleError::InvalidArgument(format!(
            "a {} cannot be asked to {}",
            kind, transition
        )));
    }

    if is_effectively_finalized(kind, record, now) {
        return Err(LifecycleError::FailedPrecondition(format!(
            "{} {} is finalized",
            kind, record.slug
        )));
    }

    let current = resolve_state(kind, record);
    if current == transition.target(kind) {
        return Ok(GuardDecision::AlreadyInTarget);
    }

    if transition.legal_sources(kind).contains(&current) {
        return Ok(GuardDecision::Apply { from: current });
    }

    let hint = match (transition, kind, current) {
        (Transition::MoveToTrash, ArtifactKind::Publication, ArtifactState::Active) => {
            "; pause it first"
        }
        _ => "",
    };
    Err(LifecycleError::FailedPrecondition(format!(
        "cannot {} {} {} while {}{}",
        transition, kind, record.slug, current, hint
    )))
}
