//! Legacy record normalization.
//!
//! Records written before the explicit state field existed are inferred from
//! their timestamps. The first guarded read writes the inferred state back so
//! the inference does not have to be repeated forever.

use crate::model::{ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, FieldChange};
use crate::resolver::{is_legacy, resolve_state, trash_entry_deadline, trashed_at};

/// Patch that upgrades a legacy record to the explicit-field form, or `None`
/// if the record is already normalized.
pub fn normalization_patch(kind: ArtifactKind, record: &ArtifactRecord) -> Option<ArtifactPatch> {
    if !is_legacy(kind, record) {
        return None;
    }

    let state = resolve_state(kind, record);
    let mut patch = ArtifactPatch {
        state: FieldChange::Set(state),
        ..Default::default()
    };

    if state == ArtifactState::Trash {
        let stored = record.purge_at.as_ref().and_then(|ts| ts.to_datetime());
        if stored.is_none() {
            if let Some(entered) = trashed_at(record) {
                patch.purge_at = FieldChange::Set(trash_entry_deadline(kind, record, entered));
            }
        }
    }

    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::retention;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_normalized_record_needs_no_patch() {
        let record = ArtifactRecord::new("a1", "u1");
        assert!(normalization_patch(ArtifactKind::Draft, &record).is_none());
    }

    #[test]
    fn test_legacy_trash_gets_state_and_deadline() {
        let trashed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = ArtifactRecord::new("a1", "u1");
        record.state = None;
        record.trashed_at = Some(trashed.into());

        let patch = normalization_patch(ArtifactKind::Draft, &record).unwrap();
        assert_eq!(patch.state, FieldChange::Set(ArtifactState::Trash));
        assert_eq!(patch.purge_at, FieldChange::Set(trashed + retention()));
        assert!(patch.trashed_at.is_unchanged());
    }

    #[test]
    fn test_legacy_trashed_publication_retains_from_expiry() {
        let trashed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut record = ArtifactRecord::new("p1", "u1").with_expires_at(expiry);
        record.state = None;
        record.trashed_at = Some(trashed.into());

        let patch = normalization_patch(ArtifactKind::Publication, &record).unwrap();
        assert_eq!(patch.state, FieldChange::Set(ArtifactState::Trash));
        assert_eq!(patch.purge_at, FieldChange::Set(expiry + retention()));
        assert_eq!(
            patch.purge_at,
            FieldChange::Set(trash_entry_deadline(ArtifactKind::Publication, &record, trashed))
        );
    }

    #[test]
    fn test_unrecognized_state_is_rewritten() {
        let mut record = ArtifactRecord::new("p1", "u1");
        record.state = Some("LIVE".to_string());

        let patch = normalization_patch(ArtifactKind::Publication, &record).unwrap();
        assert_eq!(patch.state, FieldChange::Set(ArtifactState::Active));
        assert!(patch.purge_at.is_unchanged());
    }
}
