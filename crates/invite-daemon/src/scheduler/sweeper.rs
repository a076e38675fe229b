//! Maintenance loop and scheduler

use crate::config::SchedulerConfig;
use chrono::{DateTime, Utc};
use invite_lifecycle::{
    ArchiveSweepSummary, ArtifactKind, DrainSummary, HistoryArchiver, RetentionPurgeJob,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Outcome of one maintenance sweep
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<ArchiveSweepSummary>,
    pub purged: Vec<DrainSummary>,
    /// Steps that failed outright (candidate queries)
    pub failures: usize,
}

/// Scheduler state
pub struct Scheduler {
    config: SchedulerConfig,
    purge: RetentionPurgeJob,
    archiver: HistoryArchiver,
    sweep_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    last_sweep: RwLock<Option<SweepReport>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        config: SchedulerConfig,
        purge: RetentionPurgeJob,
        archiver: HistoryArchiver,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (sweep_tx, sweep_rx) = mpsc::channel(10);

        let scheduler = Arc::new(Self {
            config,
            purge,
            archiver,
            sweep_tx,
            running: Arc::new(RwLock::new(false)),
            last_sweep: RwLock::new(None),
        });

        (scheduler, sweep_rx)
    }

    /// Request an immediate sweep. Returns `false` if the queue is full.
    pub fn trigger_sweep(&self) -> bool {
        self.sweep_tx.try_send(()).is_ok()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn last_sweep(&self) -> Option<SweepReport> {
        self.last_sweep.read().await.clone()
    }

    /// Run the sweep loop until [`Scheduler::stop`] is called or the trigger
    /// channel closes.
    pub async fn start(self: Arc<Self>, mut sweep_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = self.config.purge_interval_secs,
            "Scheduler started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.purge_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                Some(_) = sweep_rx.recv() => {
                    tracing::info!("Triggered sweep");
                    self.sweep().await;
                }
                else => break,
            }

            if !self.is_running().await {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// Archive expired publications, then drain both trash collections.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        match self
            .archiver
            .archive_expired(self.config.archive_batch_size)
            .await
        {
            Ok(summary) => report.archived = Some(summary),
            Err(e) => {
                tracing::error!(error = %e, "Archive sweep failed");
                report.failures += 1;
            }
        }

        for kind in ArtifactKind::ALL {
            match self
                .purge
                .drain(kind, None, self.config.max_drain_passes)
                .await
            {
                Ok(summary) => {
                    tracing::debug!(
                        kind = %kind,
                        passes = summary.passes,
                        deleted = summary.totals.deleted,
                        "Drained trash"
                    );
                    report.purged.push(summary);
                }
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "Purge drain failed");
                    report.failures += 1;
                }
            }
        }

        *self.last_sweep.write().await = Some(report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invite_lifecycle::{
        ArtifactRecord, ArtifactState, BlobLayout, DocumentStore, HistoryConfig,
        InMemoryBlobStore, InMemoryDocumentStore, InMemoryHistoryStore, ManualClock, PurgeConfig,
    };

    fn scheduler_with(
        documents: Arc<InMemoryDocumentStore>,
        now: DateTime<Utc>,
    ) -> (Arc<Scheduler>, mpsc::Receiver<()>) {
        let clock = Arc::new(ManualClock::new(now));
        let purge = RetentionPurgeJob::new(
            documents.clone(),
            Arc::new(InMemoryBlobStore::new()),
            clock.clone(),
            BlobLayout::default(),
            PurgeConfig::default(),
        );
        let archiver = HistoryArchiver::new(
            documents,
            Arc::new(InMemoryHistoryStore::new()),
            clock,
            HistoryConfig::default(),
        );
        Scheduler::new(SchedulerConfig::default(), purge, archiver)
    }

    #[tokio::test]
    async fn test_sweep_archives_and_purges() {
        let now = Utc::now();
        let documents = Arc::new(InMemoryDocumentStore::new());

        let mut old = ArtifactRecord::new("d1", "u1").with_state(ArtifactState::Trash);
        old.trashed_at = Some((now - chrono::Duration::days(45)).into());
        documents.insert(ArtifactKind::Draft, old).await.unwrap();
        documents
            .insert(
                ArtifactKind::Publication,
                ArtifactRecord::new("p1", "u1").with_expires_at(now - chrono::Duration::days(1)),
            )
            .await
            .unwrap();

        let (scheduler, _rx) = scheduler_with(documents.clone(), now);
        let report = scheduler.sweep().await;

        assert_eq!(report.failures, 0);
        assert_eq!(report.archived.map(|a| a.archived), Some(1));
        let deleted: usize = report.purged.iter().map(|d| d.totals.deleted).sum();
        assert_eq!(deleted, 1);
        assert!(!documents.contains(ArtifactKind::Draft, "d1").await);
        assert!(scheduler.last_sweep().await.is_some());
    }

    #[tokio::test]
    async fn test_query_failures_are_counted() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        documents.set_query_failure(true);

        let (scheduler, _rx) = scheduler_with(documents, Utc::now());
        let report = scheduler.sweep().await;
        assert_eq!(report.failures, 3);
    }

    #[tokio::test]
    async fn test_trigger_runs_sweep_and_stop_ends_loop() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let (scheduler, rx) = scheduler_with(documents, Utc::now());

        let handle = tokio::spawn(scheduler.clone().start(rx));
        while !scheduler.is_running().await {
            tokio::task::yield_now().await;
        }
        scheduler.stop().await;
        assert!(scheduler.trigger_sweep());

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler loop should exit")
            .unwrap();
        assert!(scheduler.last_sweep().await.is_some());
    }
}
