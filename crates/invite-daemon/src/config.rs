//! Configuration for invite-daemon

use invite_lifecycle::LifecycleConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Caller identity and admin access
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Engine configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the background sweep at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sweep interval in seconds
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Upper bound on purge batches per kind and sweep
    #[serde(default = "default_max_drain_passes")]
    pub max_drain_passes: usize,

    /// Expired publications archived per sweep
    #[serde(default = "default_archive_batch_size")]
    pub archive_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            purge_interval_secs: default_purge_interval(),
            max_drain_passes: default_max_drain_passes(),
            archive_batch_size: default_archive_batch_size(),
        }
    }
}

/// Caller identity and admin access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the authenticated caller id, set by the upstream proxy
    ///
    /// Trust boundary: the daemon believes this header unconditionally. Expose
    /// it only behind a proxy that strips the header from inbound requests
    /// and sets it from the session it authenticated.
    #[serde(default = "default_caller_header")]
    pub caller_header: String,

    /// Token required on maintenance endpoints; open when unset
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            caller_header: default_caller_header(),
            admin_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_purge_interval() -> u64 {
    3600
}

fn default_max_drain_passes() -> usize {
    20
}

fn default_archive_batch_size() -> usize {
    100
}

fn default_caller_header() -> String {
    "x-caller-id".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `INVITE__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with INVITE prefix
        builder = builder.add_source(
            config::Environment::with_prefix("INVITE")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.auth.caller_header, "x-caller-id");
        assert!(config.auth.admin_token.is_none());
        assert_eq!(config.lifecycle.purge.default_batch_size, 250);
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.purge_interval_secs, 3600);
        assert_eq!(config.max_drain_passes, 20);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.lifecycle.layout.draft_prefix, "drafts");
        assert_eq!(config.scheduler.archive_batch_size, 100);
    }
}
