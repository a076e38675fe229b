//! Invite daemon - lifecycle and retention service
//!
//! The invite daemon provides:
//! - REST API for moving drafts and publications through their lifecycle
//! - Scheduled archival of expired publications
//! - Scheduled purge of trashed artifacts past their retention window

use clap::Parser;
use invite_daemon::error::{DaemonError, DaemonResult};
use invite_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Invite daemon CLI
#[derive(Parser)]
#[command(name = "invited")]
#[command(about = "Invite daemon - content lifecycle and retention service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "INVITE_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the configuration file)
    #[arg(short, long, env = "INVITE_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "INVITE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "INVITE_LOG_JSON")]
    json: bool,

    /// Disable the background sweep
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;
    if cli.no_scheduler {
        config.scheduler.enabled = false;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        scheduler = config.scheduler.enabled,
        purge_interval_secs = config.scheduler.purge_interval_secs,
        "Starting invite daemon"
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
