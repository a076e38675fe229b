//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::Scheduler;
use axum::Router;
use invite_lifecycle::{
    BlobStore, Clock, DocumentStore, HistoryArchiver, HistoryStore, InMemoryBlobStore,
    InMemoryDocumentStore, InMemoryHistoryStore, LifecycleService, RetentionPurgeJob, SystemClock,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Store handles the engine runs against
#[derive(Clone)]
pub struct Backends {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub history: Arc<dyn HistoryStore>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    /// Process-local stores for development and tests
    pub fn in_memory() -> Self {
        Self {
            documents: Arc::new(InMemoryDocumentStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            history: Arc::new(InMemoryHistoryStore::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Invite lifecycle daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
    scheduler: Arc<Scheduler>,
    sweep_rx: mpsc::Receiver<()>,
}

impl Server {
    /// Create a new server backed by in-memory stores
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        Self::with_backends(config, Backends::in_memory())
    }

    /// Create a new server over the given stores
    pub fn with_backends(config: DaemonConfig, backends: Backends) -> DaemonResult<Self> {
        let lifecycle_config = &config.lifecycle;
        if lifecycle_config.purge.max_batch_size == 0 {
            return Err(DaemonError::Config(
                "lifecycle.purge.max_batch_size must be at least 1".to_string(),
            ));
        }

        let lifecycle = LifecycleService::new(backends.documents.clone(), backends.clock.clone());
        let purge = RetentionPurgeJob::new(
            backends.documents.clone(),
            backends.blobs.clone(),
            backends.clock.clone(),
            lifecycle_config.layout.clone(),
            lifecycle_config.purge.clone(),
        );
        let archiver = HistoryArchiver::new(
            backends.documents,
            backends.history,
            backends.clock,
            lifecycle_config.history.clone(),
        );

        let (scheduler, sweep_rx) =
            Scheduler::new(config.scheduler.clone(), purge.clone(), archiver.clone());

        let state = AppState::new(
            lifecycle,
            purge,
            archiver,
            scheduler.clone(),
            config.auth.clone(),
        );

        Ok(Self {
            config,
            state,
            scheduler,
            sweep_rx,
        })
    }

    /// Router over this server's state
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.config.server.enable_cors)
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = self.router();

        // Create listener
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Invite daemon listening on {}", addr);

        // Start scheduler in background
        if self.config.scheduler.enabled {
            let scheduler = self.scheduler.clone();
            let sweep_rx = self.sweep_rx;
            tokio::spawn(async move {
                scheduler.start(sweep_rx).await;
            });
        } else {
            tracing::info!("Scheduler disabled; purge runs only on request");
        }

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Invite daemon shutting down");

        // Stop scheduler
        self.scheduler.stop().await;

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
