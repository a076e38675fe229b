//! Scheduled maintenance
//!
//! The scheduler is responsible for:
//! - Archiving publications whose active life has ended
//! - Draining the trash of both artifact kinds past their retention window

mod sweeper;

pub use sweeper::{Scheduler, SweepReport};
