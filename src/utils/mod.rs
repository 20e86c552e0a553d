//! Utility functions module

pub mod signals;
pub mod time_fmt;

// Re-export main functions
pub use signals::shutdown_signal;
pub use time_fmt::{format_clock, format_uptime};
