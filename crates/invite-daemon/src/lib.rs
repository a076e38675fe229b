//! Invite lifecycle daemon library
//!
//! This module provides the core components for the invite daemon:
//! - REST API handlers for trash, restore, pause, resume and purge
//! - Scheduled archival and retention purge
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use scheduler::Scheduler;
pub use server::{Backends, Server};
