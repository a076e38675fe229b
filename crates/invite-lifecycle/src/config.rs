//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::model::ArtifactKind;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Retention purge job settings
    #[serde(default)]
    pub purge: PurgeConfig,

    /// Blob-store path conventions
    #[serde(default)]
    pub layout: BlobLayout,

    /// History archival settings
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Retention purge job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Batch size used when the caller does not supply one
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Upper clamp for caller-supplied batch sizes
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Items purged in parallel within one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

impl PurgeConfig {
    /// Resolve a requested batch size into `[1, max_batch_size]`.
    pub fn clamp_batch_size(&self, requested: Option<usize>) -> usize {
        let max = self.max_batch_size.max(1);
        requested
            .unwrap_or(self.default_batch_size)
            .clamp(1, max)
    }
}

/// Blob-store path conventions.
///
/// These must match what the editor and publish flows write, otherwise the
/// purge job cannot find the objects it is supposed to remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobLayout {
    #[serde(default = "default_draft_prefix")]
    pub draft_prefix: String,

    #[serde(default = "default_publication_prefix")]
    pub publication_prefix: String,

    #[serde(default = "default_thumbnail_prefix")]
    pub thumbnail_prefix: String,
}

impl Default for BlobLayout {
    fn default() -> Self {
        Self {
            draft_prefix: default_draft_prefix(),
            publication_prefix: default_publication_prefix(),
            thumbnail_prefix: default_thumbnail_prefix(),
        }
    }
}

impl BlobLayout {
    /// `{artifactKind}/{slug}/`
    pub fn primary_prefix(&self, kind: ArtifactKind, slug: &str) -> String {
        let root = match kind {
            ArtifactKind::Draft => &self.draft_prefix,
            ArtifactKind::Publication => &self.publication_prefix,
        };
        format!("{}/{}/", root, slug)
    }

    /// `{thumbnailPrefix}/{ownerId}/{slug}`
    ///
    /// Not a directory: it names the thumbnail object itself, plus anything
    /// continuing it with `/` or `.`. Delete it with `BlobStore::delete_path`.
    pub fn thumbnail_prefix(&self, owner_id: &str, slug: &str) -> String {
        format!("{}/{}/{}", self.thumbnail_prefix, owner_id, slug)
    }
}

/// History archival configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Descriptive fields copied from the live record into history
    #[serde(default = "default_retained_fields")]
    pub retained_fields: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retained_fields: default_retained_fields(),
        }
    }
}

// Default value helpers
fn default_batch_size() -> usize {
    250
}

fn default_max_batch_size() -> usize {
    500
}

fn default_concurrency() -> usize {
    1
}

fn default_draft_prefix() -> String {
    "drafts".to_string()
}

fn default_publication_prefix() -> String {
    "publications".to_string()
}

fn default_thumbnail_prefix() -> String {
    "thumbnails".to_string()
}

fn default_retained_fields() -> Vec<String> {
    ["title", "eventDate", "templateId", "thumbnailUrl"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_clamping() {
        let config = PurgeConfig::default();
        assert_eq!(config.clamp_batch_size(None), 250);
        assert_eq!(config.clamp_batch_size(Some(0)), 1);
        assert_eq!(config.clamp_batch_size(Some(10)), 10);
        assert_eq!(config.clamp_batch_size(Some(10_000)), 500);
    }

    #[test]
    fn test_blob_paths() {
        let layout = BlobLayout::default();
        assert_eq!(
            layout.primary_prefix(ArtifactKind::Draft, "a1"),
            "drafts/a1/"
        );
        assert_eq!(
            layout.primary_prefix(ArtifactKind::Publication, "a1"),
            "publications/a1/"
        );
        assert_eq!(layout.thumbnail_prefix("u1", "a1"), "thumbnails/u1/a1");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LifecycleConfig =
            serde_json::from_value(serde_json::json!({"purge": {"concurrency": 4}})).unwrap();
        assert_eq!(config.purge.concurrency, 4);
        assert_eq!(config.purge.default_batch_size, 250);
        assert_eq!(config.layout.thumbnail_prefix, "thumbnails");
    }
}
