//! Background tasks module
//!
//! This module contains the tasks that run alongside the HTTP server.

pub mod fleet_task;
pub mod progress_journal;

// Re-export main types
pub use fleet_task::{fleet_task, FleetCommand, FleetHandle};
pub use progress_journal::progress_journal_task;
