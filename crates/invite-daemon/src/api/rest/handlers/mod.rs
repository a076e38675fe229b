//! API request handlers

mod artifacts;
mod health;
mod maintenance;

pub use artifacts::*;
pub use health::*;
pub use maintenance::*;
