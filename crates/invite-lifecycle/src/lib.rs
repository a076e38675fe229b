//! Invitation content lifecycle and retention engine
//!
//! Governs how drafts and publications move between `Active`, `Paused`,
//! `Trash` and `Finalized`, and how trashed artifacts are permanently
//! removed once their retention window has passed:
//! - State Resolver: canonical state and key dates of a persisted record
//! - Transition Guard and Handlers: authenticated, idempotent trash/restore
//!   (plus publication pause/resume)
//! - Retention Purge Job: fault-isolated batch deletion of due artifacts
//! - History Archival: two-phase copy-then-detach of finalized publications
//!
//! Backends are injected through the [`DocumentStore`], [`BlobStore`] and
//! [`HistoryStore`] traits; in-memory implementations live in [`memory`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod history;
pub mod memory;
pub mod migration;
pub mod model;
pub mod purge;
pub mod resolver;
pub mod store;
pub mod timestamp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BlobLayout, HistoryConfig, LifecycleConfig, PurgeConfig};
pub use error::{LifecycleError, LifecycleResult, StorageError, StorageResult};
pub use guard::{GuardDecision, Transition, TransitionGuard};
pub use handlers::{LifecycleService, PauseOutcome, RestoreOutcome, ResumeOutcome, TrashOutcome};
pub use history::{ArchiveOutcome, ArchiveSweepSummary, HistoryArchiver};
pub use memory::{InMemoryBlobStore, InMemoryDocumentStore, InMemoryHistoryStore};
pub use model::{
    ArtifactKind, ArtifactPatch, ArtifactRecord, ArtifactState, FieldChange, HistoryRecord,
};
pub use purge::{DrainSummary, PurgeSummary, RetentionPurgeJob};
pub use resolver::{LifecycleView, RETENTION_DAYS};
pub use store::{BlobStore, DocumentStore, HistoryStore};
pub use timestamp::RawTimestamp;
