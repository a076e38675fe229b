//! In-memory store implementations.
//!
//! Deterministic and test-friendly. Each store carries failure switches so
//! partial outages can be reproduced without a real backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::model::{ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, HistoryRecord};
use crate::store::{BlobStore, DocumentStore, HistoryStore};
use crate::timestamp::RawTimestamp;

type DocumentKey = (ArtifactKind, String);

/// In-memory document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<DocumentKey, ArtifactRecord>>>,
    failing_deletes: Arc<RwLock<HashSet<String>>>,
    fail_queries: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete of `slug` fail with a backend error.
    pub async fn fail_delete_for(&self, slug: impl Into<String>) {
        self.failing_deletes.write().await.insert(slug.into());
    }

    /// Drop every injected failure.
    pub async fn clear_failures(&self) {
        self.failing_deletes.write().await.clear();
        self.set_query_failure(false);
        self.set_write_failure(false);
    }

    pub fn set_query_failure(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self, kind: ArtifactKind) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub async fn contains(&self, kind: ArtifactKind, slug: &str) -> bool {
        self.documents
            .read()
            .await
            .contains_key(&(kind, slug.to_string()))
    }

    fn check_writes(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("document store unavailable".to_string()));
        }
        Ok(())
    }
}

/// Next `updatedAt`, strictly after the previous one.
fn next_update_stamp(previous: Option<&RawTimestamp>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous.and_then(|ts| ts.to_datetime()) {
        Some(prev) if prev.timestamp_millis() >= now.timestamp_millis() => {
            prev + Duration::milliseconds(1)
        }
        _ => now,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, kind: ArtifactKind, slug: &str) -> StorageResult<Option<ArtifactRecord>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(kind, slug.to_string())).cloned())
    }

    async fn insert(&self, kind: ArtifactKind, mut record: ArtifactRecord) -> StorageResult<()> {
        self.check_writes()?;
        let mut documents = self.documents.write().await;
        let key = (kind, record.slug.clone());
        if documents.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "{} {} already exists",
                kind, record.slug
            )));
        }
        record.updated_at = Some(next_update_stamp(None).into());
        documents.insert(key, record);
        Ok(())
    }

    async fn merge(
        &self,
        kind: ArtifactKind,
        slug: &str,
        patch: &ArtifactPatch,
    ) -> StorageResult<ArtifactRecord> {
        self.check_writes()?;
        let mut documents = self.documents.write().await;
        let record = documents
            .get_mut(&(kind, slug.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{} {} not found", kind, slug)))?;

        patch.apply_to(record);
        record.updated_at = Some(next_update_stamp(record.updated_at.as_ref()).into());
        Ok(record.clone())
    }

    async fn merge_if_unchanged(
        &self,
        kind: ArtifactKind,
        slug: &str,
        expected: Option<&RawTimestamp>,
        patch: &ArtifactPatch,
    ) -> StorageResult<ArtifactRecord> {
        self.check_writes()?;
        let mut documents = self.documents.write().await;
        let record = documents
            .get_mut(&(kind, slug.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{} {} not found", kind, slug)))?;

        let stored = record.updated_at.as_ref().and_then(|ts| ts.to_millis());
        if stored != expected.and_then(|ts| ts.to_millis()) {
            return Err(StorageError::Conflict(format!(
                "{} {} was modified concurrently",
                kind, slug
            )));
        }

        patch.apply_to(record);
        record.updated_at = Some(next_update_stamp(record.updated_at.as_ref()).into());
        Ok(record.clone())
    }

    async fn delete(&self, kind: ArtifactKind, slug: &str) -> StorageResult<bool> {
        if self.failing_deletes.read().await.contains(slug) {
            return Err(StorageError::Backend(format!(
                "delete of {} {} rejected",
                kind, slug
            )));
        }
        self.check_writes()?;
        let mut documents = self.documents.write().await;
        Ok(documents.remove(&(kind, slug.to_string())).is_some())
    }

    async fn query_by_state(
        &self,
        kind: ArtifactKind,
        state: ArtifactState,
        limit: usize,
    ) -> StorageResult<Vec<ArtifactRecord>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("query failed".to_string()));
        }
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|((k, _), record)| {
                *k == kind
                    && record
                        .state
                        .as_deref()
                        .and_then(ArtifactState::parse_normalized)
                        == Some(state)
            })
            .map(|(_, record)| record.clone())
            .take(limit)
            .collect())
    }

    async fn query_expired(
        &self,
        kind: ArtifactKind,
        state: ArtifactState,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StorageResult<Vec<ArtifactRecord>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("query failed".to_string()));
        }
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|((k, _), record)| {
                *k == kind
                    && record
                        .state
                        .as_deref()
                        .and_then(ArtifactState::parse_normalized)
                        == Some(state)
                    && record
                        .expires_at
                        .as_ref()
                        .and_then(|ts| ts.to_datetime())
                        .is_some_and(|expiry| expiry <= cutoff)
            })
            .map(|(_, record)| record.clone())
            .take(limit)
            .collect())
    }
}

/// In-memory blob store keyed by object path.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    failing_prefixes: Arc<RwLock<HashSet<String>>>,
    delete_requests: Arc<RwLock<Vec<String>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deletes of any prefix starting with `prefix` fail.
    pub async fn fail_prefix(&self, prefix: impl Into<String>) {
        self.failing_prefixes.write().await.insert(prefix.into());
    }

    pub async fn clear_failures(&self) {
        self.failing_prefixes.write().await.clear();
    }

    /// Every prefix passed to `delete_prefix`, in call order.
    pub async fn delete_requests(&self) -> Vec<String> {
        self.delete_requests.read().await.clone()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    async fn remove_matching(
        &self,
        requested: &str,
        matches: impl Fn(&str) -> bool,
    ) -> StorageResult<usize> {
        self.delete_requests.write().await.push(requested.to_string());

        let failing = self.failing_prefixes.read().await;
        if failing.iter().any(|f| requested.starts_with(f.as_str())) {
            return Err(StorageError::Backend(format!(
                "blob store unavailable for {}",
                requested
            )));
        }
        drop(failing);

        let mut objects = self.objects.write().await;
        let doomed: Vec<String> = objects
            .range(requested.to_string()..)
            .take_while(|(path, _)| path.starts_with(requested))
            .filter(|(path, _)| matches(path))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &doomed {
            objects.remove(path);
        }
        Ok(doomed.len())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> StorageResult<()> {
        if path.is_empty() {
            return Err(StorageError::InvalidData("empty object path".to_string()));
        }
        self.objects.write().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        self.remove_matching(prefix, |_| true).await
    }

    async fn delete_path(&self, path: &str) -> StorageResult<usize> {
        self.remove_matching(path, |key| {
            let rest = &key[path.len()..];
            rest.is_empty() || rest.starts_with('/') || rest.starts_with('.')
        })
        .await
    }
}

/// In-memory history set.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<Vec<HistoryRecord>>>,
    fail_appends: AtomicBool,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_append_failure(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> StorageResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("history store unavailable".to_string()));
        }
        self.entries.write().await.push(record);
        Ok(())
    }

    async fn list_for_slug(&self, origin_slug: &str) -> StorageResult<Vec<HistoryRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.origin_slug == origin_slug)
            .cloned()
            .collect())
    }
}
