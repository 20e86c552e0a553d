//! State management module
//!
//! Flag registers, the timer and batch state machines, and the state shared
//! with the HTTP handlers.

pub mod app_state;
pub mod state_register;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use state_register::{StateFlags, StateRegister};
pub use timer_state::{BatchPhase, TimerState};
