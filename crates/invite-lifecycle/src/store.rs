//! Store interfaces
//!
//! The engine never holds global handles to its backends; every service takes
//! these traits explicitly so in-memory fakes can stand in under test.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::model::{ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, HistoryRecord};
use crate::timestamp::RawTimestamp;

/// Document store holding the live artifact records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load one record.
    async fn get(&self, kind: ArtifactKind, slug: &str) -> StorageResult<Option<ArtifactRecord>>;

    /// Create a record. Fails with `Conflict` if the slug is taken.
    async fn insert(&self, kind: ArtifactKind, record: ArtifactRecord) -> StorageResult<()>;

    /// Merge a patch into an existing record and return the stored result.
    ///
    /// Fields not named by the patch are left untouched. The store assigns
    /// `updatedAt`. Fails with `NotFound` if the record does not exist.
    async fn merge(
        &self,
        kind: ArtifactKind,
        slug: &str,
        patch: &ArtifactPatch,
    ) -> StorageResult<ArtifactRecord>;

    /// Merge a patch only if the stored `updatedAt` still equals `expected`.
    ///
    /// Fails with `Conflict` when another writer got there first, and with
    /// `NotFound` if the record does not exist.
    async fn merge_if_unchanged(
        &self,
        kind: ArtifactKind,
        slug: &str,
        expected: Option<&RawTimestamp>,
        patch: &ArtifactPatch,
    ) -> StorageResult<ArtifactRecord>;

    /// Delete a record. Returns `false` if it was already absent.
    async fn delete(&self, kind: ArtifactKind, slug: &str) -> StorageResult<bool>;

    /// Records whose explicit state field equals `state`, at most `limit`,
    /// in no particular order.
    async fn query_by_state(
        &self,
        kind: ArtifactKind,
        state: ArtifactState,
        limit: usize,
    ) -> StorageResult<Vec<ArtifactRecord>>;

    /// Records in explicit `state` whose `expiresAt` is at or before
    /// `cutoff`, at most `limit`.
    async fn query_expired(
        &self,
        kind: ArtifactKind,
        state: ArtifactState,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StorageResult<Vec<ArtifactRecord>>;
}

/// Blob store holding artifact assets and derived objects.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Object paths starting with `prefix`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete every object under `prefix` and return how many were removed.
    ///
    /// An empty prefix is a successful no-op.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize>;

    /// Delete the object at `path` and every object whose key continues
    /// `path` with `/` or `.`, and return how many were removed.
    ///
    /// `a1` matches `a1`, `a1.webp` and `a1/small.png`, never `a10.webp`.
    async fn delete_path(&self, path: &str) -> StorageResult<usize>;
}

/// Append-only history set for finalized publications.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> StorageResult<()>;

    /// Entries copied from the live publication `origin_slug`.
    async fn list_for_slug(&self, origin_slug: &str) -> StorageResult<Vec<HistoryRecord>>;
}
