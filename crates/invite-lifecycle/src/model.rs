//! Persisted artifact records, merge patches and history entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::RawTimestamp;

/// The two concrete artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Editable working copy.
    Draft,
    /// Live published invitation.
    Publication,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Draft, ArtifactKind::Publication];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Draft => "draft",
            ArtifactKind::Publication => "publication",
        }
    }

    /// Name of the document collection holding this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            ArtifactKind::Draft => "drafts",
            ArtifactKind::Publication => "publications",
        }
    }

    /// States a record of this kind may legally hold.
    pub fn allows(&self, state: ArtifactState) -> bool {
        match self {
            ArtifactKind::Draft => matches!(state, ArtifactState::Active | ArtifactState::Trash),
            ArtifactKind::Publication => true,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "drafts" => Ok(ArtifactKind::Draft),
            "publication" | "publications" => Ok(ArtifactKind::Publication),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// Canonical lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    Active,
    Paused,
    Trash,
    Finalized,
}

impl ArtifactState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactState::Active => "active",
            ArtifactState::Paused => "paused",
            ArtifactState::Trash => "trash",
            ArtifactState::Finalized => "finalized",
        }
    }

    /// Parse a persisted state field. Unknown spellings yield `None`.
    pub fn parse_normalized(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ArtifactState::Active),
            "paused" => Some(ArtifactState::Paused),
            "trash" | "trashed" => Some(ArtifactState::Trash),
            "finalized" => Some(ArtifactState::Finalized),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source marker written on a live Publication once it has been mirrored
/// into the history set.
pub const HISTORY_SOURCE_MARKER: &str = "history";

/// A persisted artifact document.
///
/// Fields the engine does not own are kept in `extra` so merge writes never
/// drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Raw state field; legacy records may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<RawTimestamp>,

    /// Where the record lives; `"history"` once archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArtifactRecord {
    /// A fresh record in the `Active` state, as the editor/publish flow
    /// creates it.
    pub fn new(slug: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            owner_id: Some(owner_id.into()),
            state: Some(ArtifactState::Active.as_str().to_string()),
            trashed_at: None,
            purge_at: None,
            expires_at: None,
            paused_at: None,
            updated_at: None,
            source: None,
            extra: Map::new(),
        }
    }

    pub fn with_state(mut self, state: ArtifactState) -> Self {
        self.state = Some(state.as_str().to_string());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Owner id if present and non-empty.
    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref().filter(|owner| !owner.trim().is_empty())
    }

    pub fn is_archived(&self) -> bool {
        self.source
            .as_deref()
            .is_some_and(|source| source.eq_ignore_ascii_case(HISTORY_SOURCE_MARKER))
    }
}

/// A single field in a merge patch.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldChange<T> {
    #[default]
    Unchanged,
    Set(T),
    Delete,
}

impl<T> FieldChange<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldChange::Unchanged)
    }

    fn apply_with<U>(&self, slot: &mut Option<U>, map: impl FnOnce(&T) -> U) {
        match self {
            FieldChange::Unchanged => {}
            FieldChange::Set(value) => *slot = Some(map(value)),
            FieldChange::Delete => *slot = None,
        }
    }
}

/// Merge-style update of one artifact document.
///
/// Only the fields this engine owns can be touched; everything else in the
/// document survives the write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtifactPatch {
    pub state: FieldChange<ArtifactState>,
    pub trashed_at: FieldChange<DateTime<Utc>>,
    pub purge_at: FieldChange<DateTime<Utc>>,
    pub paused_at: FieldChange<DateTime<Utc>>,
    pub source: FieldChange<String>,
}

impl ArtifactPatch {
    pub fn is_empty(&self) -> bool {
        self.state.is_unchanged()
            && self.trashed_at.is_unchanged()
            && self.purge_at.is_unchanged()
            && self.paused_at.is_unchanged()
            && self.source.is_unchanged()
    }

    /// Apply the patch to an in-memory copy of the document.
    pub fn apply_to(&self, record: &mut ArtifactRecord) {
        self.state
            .apply_with(&mut record.state, |s| s.as_str().to_string());
        self.trashed_at
            .apply_with(&mut record.trashed_at, |dt| RawTimestamp::from(*dt));
        self.purge_at
            .apply_with(&mut record.purge_at, |dt| RawTimestamp::from(*dt));
        self.paused_at
            .apply_with(&mut record.paused_at, |dt| RawTimestamp::from(*dt));
        self.source.apply_with(&mut record.source, |s| s.clone());
    }
}

/// Immutable, append-only mirror of a finalized Publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Fresh id; history entries are never keyed by slug.
    pub id: String,
    pub origin_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::iso8601::option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::timestamp::iso8601")]
    pub archived_at: DateTime<Utc>,
    /// Reduced copy of the live record's descriptive fields.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let json = serde_json::json!({
            "slug": "a1",
            "ownerId": "u1",
            "state": "active",
            "title": "Garden party",
            "pages": [{"id": 1}]
        });
        let record: ArtifactRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.extra.get("title"), Some(&json["title"]));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["pages"], json["pages"]);
    }

    #[test]
    fn test_legacy_record_without_state_parses() {
        let record: ArtifactRecord = serde_json::from_value(serde_json::json!({
            "slug": "old",
            "ownerId": "u1",
            "trashedAt": {"seconds": 1700000000}
        }))
        .unwrap();
        assert!(record.state.is_none());
        assert_eq!(
            record.trashed_at.and_then(|t| t.to_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_patch_sets_and_deletes() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut record = ArtifactRecord::new("a1", "u1").with_field("title", "x".into());

        ArtifactPatch {
            state: FieldChange::Set(ArtifactState::Trash),
            trashed_at: FieldChange::Set(at),
            ..Default::default()
        }
        .apply_to(&mut record);
        assert_eq!(record.state.as_deref(), Some("trash"));
        assert!(record.trashed_at.is_some());

        ArtifactPatch {
            state: FieldChange::Set(ArtifactState::Active),
            trashed_at: FieldChange::Delete,
            ..Default::default()
        }
        .apply_to(&mut record);
        assert_eq!(record.state.as_deref(), Some("active"));
        assert!(record.trashed_at.is_none());
        assert_eq!(record.extra.get("title"), Some(&Value::from("x")));
    }

    #[test]
    fn test_state_parsing_is_lenient() {
        assert_eq!(
            ArtifactState::parse_normalized(" Trashed "),
            Some(ArtifactState::Trash)
        );
        assert_eq!(ArtifactState::parse_normalized("deleted"), None);
    }

    #[test]
    fn test_kind_parsing_accepts_collection_names() {
        assert_eq!("drafts".parse::<ArtifactKind>(), Ok(ArtifactKind::Draft));
        assert_eq!(
            "Publication".parse::<ArtifactKind>(),
            Ok(ArtifactKind::Publication)
        );
        assert!("templates".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_draft_never_pauses() {
        assert!(!ArtifactKind::Draft.allows(ArtifactState::Paused));
        assert!(!ArtifactKind::Draft.allows(ArtifactState::Finalized));
        assert!(ArtifactKind::Publication.allows(ArtifactState::Paused));
    }
}
