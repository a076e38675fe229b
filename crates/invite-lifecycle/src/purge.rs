//! Retention Purge Job
//!
//! Scans trashed artifacts and permanently deletes those past their deadline.
//! Deletion of one item is three sub-steps that fault independently:
//!
//! 1. blobs under the primary prefix,
//! 2. owner-scoped thumbnails,
//! 3. the document itself.
//!
//! Only step 3 decides whether the item counts as `deleted` or as an error.
//! A failure to query the batch is the only error surfaced to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::config::{BlobLayout, PurgeConfig};
use crate::error::LifecycleResult;
use crate::model::{ArtifactKind, ArtifactRecord, ArtifactState};
use crate::resolver::compute_purge_deadline;
use crate::store::{BlobStore, DocumentStore};

/// Counters of one purge batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped_pending: usize,
    pub skipped_invalid: usize,
    pub errors: usize,
}

impl PurgeSummary {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Deleted => self.deleted += 1,
            ItemOutcome::Pending => self.skipped_pending += 1,
            ItemOutcome::Invalid => self.skipped_invalid += 1,
            ItemOutcome::Failed => self.errors += 1,
        }
    }

    /// Add another summary's counters to this one.
    pub fn merge(&mut self, other: &PurgeSummary) {
        self.scanned += other.scanned;
        self.deleted += other.deleted;
        self.skipped_pending += other.skipped_pending;
        self.skipped_invalid += other.skipped_invalid;
        self.errors += other.errors;
    }
}

/// Result of [`RetentionPurgeJob::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub kind: Option<ArtifactKind>,
    pub passes: usize,
    /// Whether the last pass came back short of a full batch.
    pub drained: bool,
    #[serde(flatten)]
    pub totals: PurgeSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Deleted,
    Pending,
    Invalid,
    Failed,
}

/// Batch deleter for trashed artifacts.
#[derive(Clone)]
pub struct RetentionPurgeJob {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    layout: BlobLayout,
    config: PurgeConfig,
}

impl RetentionPurgeJob {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        layout: BlobLayout,
        config: PurgeConfig,
    ) -> Self {
        Self {
            documents,
            blobs,
            clock,
            layout,
            config,
        }
    }

    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Run one batch.
    ///
    /// `scanned == batch size` in the result means more candidates may be
    /// waiting.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn purge_trashed(
        &self,
        kind: ArtifactKind,
        batch_size: Option<usize>,
    ) -> LifecycleResult<PurgeSummary> {
        let limit = self.config.clamp_batch_size(batch_size);
        let now = self.clock.now();

        let candidates = self
            .documents
            .query_by_state(kind, ArtifactState::Trash, limit)
            .await
            .map_err(|e| {
                error!(kind = %kind, error = %e, "Failed to query purge candidates");
                e
            })?;

        let mut summary = PurgeSummary {
            scanned: candidates.len(),
            ..Default::default()
        };

        let workers = self.config.concurrency.max(1);
        let outcomes: Vec<ItemOutcome> = stream::iter(candidates)
            .map(|record| self.purge_item(kind, record, now))
            .buffer_unordered(workers)
            .collect()
            .await;

        for outcome in outcomes {
            summary.record(outcome);
        }

        info!(
            kind = %kind,
            batch_size = limit,
            scanned = summary.scanned,
            deleted = summary.deleted,
            skipped_pending = summary.skipped_pending,
            skipped_invalid = summary.skipped_invalid,
            errors = summary.errors,
            "Purge batch complete"
        );

        Ok(summary)
    }

    /// Run batches until one comes back short or `max_passes` is reached.
    pub async fn drain(
        &self,
        kind: ArtifactKind,
        batch_size: Option<usize>,
        max_passes: usize,
    ) -> LifecycleResult<DrainSummary> {
        let limit = self.config.clamp_batch_size(batch_size);
        let mut report = DrainSummary {
            kind: Some(kind),
            ..Default::default()
        };

        while report.passes < max_passes.max(1) {
            let summary = self.purge_trashed(kind, Some(limit)).await?;
            report.passes += 1;
            report.totals.merge(&summary);

            if summary.scanned < limit {
                report.drained = true;
                break;
            }
            // A full batch that deleted nothing would return the same page again.
            if summary.deleted == 0 {
                debug!(kind = %kind, "Full batch without deletions; stopping drain");
                break;
            }
        }

        Ok(report)
    }

    async fn purge_item(
        &self,
        kind: ArtifactKind,
        record: ArtifactRecord,
        now: DateTime<Utc>,
    ) -> ItemOutcome {
        let slug = record.slug.as_str();

        let deadline = match compute_purge_deadline(&record) {
            Some(deadline) => deadline,
            None => {
                warn!(
                    kind = %kind,
                    slug = %slug,
                    "Trashed record has no computable purge deadline; leaving it for inspection"
                );
                return ItemOutcome::Invalid;
            }
        };

        if deadline > now {
            debug!(kind = %kind, slug = %slug, purge_at = %deadline, "Not yet due");
            return ItemOutcome::Pending;
        }

        let primary = self.layout.primary_prefix(kind, slug);
        match self.blobs.delete_prefix(&primary).await {
            Ok(removed) => {
                debug!(kind = %kind, slug = %slug, prefix = %primary, removed, "Deleted primary blobs")
            }
            Err(e) => warn!(
                kind = %kind,
                slug = %slug,
                prefix = %primary,
                error = %e,
                "Failed to delete primary blobs"
            ),
        }

        if let Some(owner) = record.owner() {
            let thumbnails = self.layout.thumbnail_prefix(owner, slug);
            match self.blobs.delete_path(&thumbnails).await {
                Ok(removed) => {
                    debug!(kind = %kind, slug = %slug, prefix = %thumbnails, removed, "Deleted thumbnails")
                }
                Err(e) => warn!(
                    kind = %kind,
                    slug = %slug,
                    prefix = %thumbnails,
                    error = %e,
                    "Failed to delete thumbnails"
                ),
            }
        }

        match self.documents.delete(kind, slug).await {
            Ok(existed) => {
                debug!(kind = %kind, slug = %slug, existed, "Purged");
                ItemOutcome::Deleted
            }
            Err(e) => {
                error!(kind = %kind, slug = %slug, error = %e, "Failed to delete document");
                ItemOutcome::Failed
            }
        }
    }
}
