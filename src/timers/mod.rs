//! Timer engine
//!
//! Countdown tasks, the controllers that own them, and the fleet that
//! aggregates their progress and keeps link groups in step.

pub mod controller;
pub mod countdown;
pub mod error;
pub mod event;
pub mod fleet;
pub mod id;

// Re-export main types
pub use controller::{LinkChanged, StartOutcome, TimerController, TimerSnapshot};
pub use countdown::{CountdownTask, TaskTiming};
pub use error::{TaskFault, TimerError};
pub use event::ProgressEvent;
pub use fleet::{FleetConfig, FleetController, FleetSnapshot, MAX_FLEET_SIZE};
pub use id::{LinkKey, TimerId};
