//! Multi Timer - concurrent countdown timers with link groups
//!
//! This library runs a fleet of independently configured countdown timers,
//! keeps linked timers in step, and reports fleet-wide progress. An HTTP API
//! exposes the operator commands.

pub mod api;
pub mod config;
pub mod services;
pub mod state;
pub mod tasks;
pub mod timers;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::AppState;
pub use tasks::FleetHandle;
pub use timers::{FleetController, TimerError};
pub use utils::signals::shutdown_signal;
