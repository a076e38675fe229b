//! State Resolver
//!
//! Pure functions deriving the canonical lifecycle state and key dates of a
//! persisted record. No I/O; "now" is always passed in.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{ArtifactKind, ArtifactRecord, ArtifactState};

/// Fixed retention window shared by both artifact kinds.
pub const RETENTION_DAYS: i64 = 30;

pub fn retention() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// The explicit state field, if present, recognized and legal for the kind.
pub fn explicit_state(kind: ArtifactKind, record: &ArtifactRecord) -> Option<ArtifactState> {
    record
        .state
        .as_deref()
        .and_then(ArtifactState::parse_normalized)
        .filter(|state| kind.allows(*state))
}

/// Derive the canonical state.
///
/// Priority: explicit field, then trash timestamp, then (publications only)
/// pause timestamp, then `Active`.
pub fn resolve_state(kind: ArtifactKind, record: &ArtifactRecord) -> ArtifactState {
    if let Some(state) = explicit_state(kind, record) {
        return state;
    }
    if trashed_at(record).is_some() {
        return ArtifactState::Trash;
    }
    if kind == ArtifactKind::Publication
        && record
            .paused_at
            .as_ref()
            .and_then(|paused| paused.to_millis())
            .is_some()
    {
        return ArtifactState::Paused;
    }
    ArtifactState::Active
}

/// Whether the record predates the explicit state field.
pub fn is_legacy(kind: ArtifactKind, record: &ArtifactRecord) -> bool {
    explicit_state(kind, record).is_none()
}

/// Trash-entry timestamp; zero or negative epochs count as absent.
pub fn trashed_at(record: &ArtifactRecord) -> Option<DateTime<Utc>> {
    record
        .trashed_at
        .as_ref()
        .and_then(|ts| ts.to_positive_datetime())
}

pub fn expires_at(record: &ArtifactRecord) -> Option<DateTime<Utc>> {
    record.expires_at.as_ref().and_then(|ts| ts.to_datetime())
}

pub fn paused_at(record: &ArtifactRecord) -> Option<DateTime<Utc>> {
    record.paused_at.as_ref().and_then(|ts| ts.to_datetime())
}

/// Whether a Publication has left its active life.
///
/// True when the record is already mirrored into history, or when its expiry
/// is at or before `now` and it is not in the trash. Trash beats passive
/// expiry so a trashed item can still be restored. Drafts never finalize.
pub fn is_effectively_finalized(
    kind: ArtifactKind,
    record: &ArtifactRecord,
    now: DateTime<Utc>,
) -> bool {
    if kind == ArtifactKind::Draft {
        return false;
    }
    if record.is_archived() {
        return true;
    }

    match resolve_state(kind, record) {
        ArtifactState::Finalized => true,
        ArtifactState::Trash => false,
        ArtifactState::Active | ArtifactState::Paused => {
            expires_at(record).is_some_and(|expiry| expiry <= now)
        }
    }
}

/// State as a dashboard should report it at `now`.
pub fn effective_state(
    kind: ArtifactKind,
    record: &ArtifactRecord,
    now: DateTime<Utc>,
) -> ArtifactState {
    if is_effectively_finalized(kind, record, now) {
        ArtifactState::Finalized
    } else {
        resolve_state(kind, record)
    }
}

/// Permanent-deletion deadline of a record.
///
/// A stored deadline wins; otherwise `trashedAt + RETENTION`. `None` means
/// "never scheduled", which is distinct from a deadline in the past.
pub fn compute_purge_deadline(record: &ArtifactRecord) -> Option<DateTime<Utc>> {
    if let Some(stored) = record.purge_at.as_ref().and_then(|ts| ts.to_datetime()) {
        return Some(stored);
    }
    trashed_at(record).map(|trashed| trashed + retention())
}

/// Deadline to persist when a record enters the trash at `trashed_at`.
///
/// Publications with an expiry retain relative to that expiry. The result is
/// never earlier than `trashed_at`.
pub fn trash_entry_deadline(
    kind: ArtifactKind,
    record: &ArtifactRecord,
    trashed_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match kind {
        ArtifactKind::Draft => trashed_at,
        ArtifactKind::Publication => expires_at(record).unwrap_or(trashed_at),
    };
    (base + retention()).max(trashed_at)
}

/// Canonical state plus key dates of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleView {
    pub kind: ArtifactKind,
    pub slug: String,
    pub state: ArtifactState,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub trashed_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub purge_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp::iso8601::option")]
    pub paused_at: Option<DateTime<Utc>>,
}

pub fn describe(kind: ArtifactKind, record: &ArtifactRecord, now: DateTime<Utc>) -> LifecycleView {
    LifecycleView {
        kind,
        slug: record.slug.clone(),
        state: effective_state(kind, record, now),
        trashed_at: trashed_at(record),
        purge_at: compute_purge_deadline(record),
        expires_at: expires_at(record),
        paused_at: paused_at(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HISTORY_SOURCE_MARKER;
    use crate::timestamp::RawTimestamp;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn legacy(slug: &str) -> ArtifactRecord {
        let mut record = ArtifactRecord::new(slug, "u1");
        record.state = None;
        record
    }

    #[test]
    fn test_explicit_state_wins() {
        let mut record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Active);
        record.trashed_at = Some(t0().into());
        assert_eq!(
            resolve_state(ArtifactKind::Draft, &record),
            ArtifactState::Active
        );
    }

    #[test]
    fn test_legacy_trash_inferred_from_timestamp() {
        let mut record = legacy("a1");
        record.trashed_at = Some(RawTimestamp::Seconds {
            seconds: 1_700_000_000,
            nanos: 0,
        });
        assert_eq!(
            resolve_state(ArtifactKind::Draft, &record),
            ArtifactState::Trash
        );
        assert!(is_legacy(ArtifactKind::Draft, &record));
    }

    #[test]
    fn test_zero_trash_timestamp_is_ignored() {
        let mut record = legacy("a1");
        record.trashed_at = Some(RawTimestamp::EpochMillis(0));
        assert_eq!(
            resolve_state(ArtifactKind::Draft, &record),
            ArtifactState::Active
        );
    }

    #[test]
    fn test_pause_inferred_only_for_publications() {
        let mut record = legacy("p1");
        record.paused_at = Some(t0().into());
        assert_eq!(
            resolve_state(ArtifactKind::Publication, &record),
            ArtifactState::Paused
        );
        assert_eq!(
            resolve_state(ArtifactKind::Draft, &record),
            ArtifactState::Active
        );
    }

    #[test]
    fn test_state_illegal_for_kind_falls_back_to_inference() {
        let record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Paused);
        assert_eq!(
            resolve_state(ArtifactKind::Draft, &record),
            ArtifactState::Active
        );
    }

    #[test]
    fn test_trash_overrides_passive_expiry() {
        let record = ArtifactRecord::new("p1", "u1")
            .with_state(ArtifactState::Trash)
            .with_expires_at(t0() - Duration::days(3));
        assert!(!is_effectively_finalized(
            ArtifactKind::Publication,
            &record,
            t0()
        ));
        assert_eq!(
            effective_state(ArtifactKind::Publication, &record, t0()),
            ArtifactState::Trash
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let record = ArtifactRecord::new("p1", "u1").with_expires_at(t0());
        assert!(is_effectively_finalized(
            ArtifactKind::Publication,
            &record,
            t0()
        ));
        assert!(!is_effectively_finalized(
            ArtifactKind::Publication,
            &record,
            t0() - Duration::milliseconds(1)
        ));
    }

    #[test]
    fn test_history_marker_finalizes_even_in_trash() {
        let mut record = ArtifactRecord::new("p1", "u1").with_state(ArtifactState::Trash);
        record.source = Some(HISTORY_SOURCE_MARKER.to_string());
        assert!(is_effectively_finalized(
            ArtifactKind::Publication,
            &record,
            t0()
        ));
    }

    #[test]
    fn test_drafts_never_finalize() {
        let record = ArtifactRecord::new("a1", "u1").with_expires_at(t0() - Duration::days(1));
        assert!(!is_effectively_finalized(ArtifactKind::Draft, &record, t0()));
    }

    #[test]
    fn test_purge_deadline_prefers_stored_value() {
        let mut record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Trash);
        record.trashed_at = Some(t0().into());
        assert_eq!(compute_purge_deadline(&record), Some(t0() + retention()));

        record.purge_at = Some(RawTimestamp::Text("2025-07-01T00:00:00Z".to_string()));
        assert_eq!(
            compute_purge_deadline(&record),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_purge_deadline_absent_without_trash_timestamp() {
        let record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Trash);
        assert_eq!(compute_purge_deadline(&record), None);
    }

    #[test]
    fn test_publication_entry_deadline_follows_expiry() {
        let record = ArtifactRecord::new("p1", "u1").with_expires_at(t0() + Duration::days(10));
        assert_eq!(
            trash_entry_deadline(ArtifactKind::Publication, &record, t0()),
            t0() + Duration::days(40)
        );
        assert_eq!(
            trash_entry_deadline(ArtifactKind::Draft, &record, t0()),
            t0() + Duration::days(30)
        );
    }

    #[test]
    fn test_entry_deadline_never_precedes_trash_time() {
        let record =
            ArtifactRecord::new("p1", "u1").with_expires_at(t0() - Duration::days(400));
        assert_eq!(
            trash_entry_deadline(ArtifactKind::Publication, &record, t0()),
            t0()
        );
    }

    #[test]
    fn test_describe_reports_key_dates() {
        let mut record = ArtifactRecord::new("a1", "u1").with_state(ArtifactState::Trash);
        record.trashed_at = Some(t0().into());
        let view = describe(ArtifactKind::Draft, &record, t0());
        assert_eq!(view.state, ArtifactState::Trash);
        assert_eq!(view.trashed_at, Some(t0()));
        assert_eq!(view.purge_at, Some(t0() + retention()));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["trashedAt"], "2025-05-01T12:00:00.000Z");
    }
}
