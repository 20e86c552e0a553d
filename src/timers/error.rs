//! Error types for timer commands and countdown faults

use std::time::Duration;

use thiserror::Error;

use super::{LinkKey, TimerId};

/// Errors reported synchronously to whoever issued a timer or fleet command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Start requested on a timer whose duration is still unset.
    #[error("timer {id} has no duration configured")]
    NotConfigured { id: TimerId },

    /// Fleet rebuild requested while a member is still counting down.
    #[error("timer {id} is still running; stop it before rebuilding the fleet")]
    FleetBusy { id: TimerId },

    /// The countdown did not exit within the stop deadline and was aborted.
    #[error("timer {id} did not terminate within {waited:?}")]
    StopTimeout { id: TimerId, waited: Duration },

    #[error("unknown timer {id}")]
    UnknownTimer { id: TimerId },

    #[error("link key {key} is outside the fleet's {groups} groups")]
    InvalidLinkKey { key: LinkKey, groups: usize },

    #[error("fleet size {requested} is outside 1..={max}")]
    InvalidFleetSize { requested: usize, max: usize },

    #[error("unknown command '{label}'")]
    UnknownCommand { label: String },

    #[error("timer {id} has no command at position {index}")]
    CommandIndexOutOfRange { id: TimerId, index: usize },

    /// The fleet task is gone, so commands can no longer be delivered.
    #[error("timer engine is not running")]
    EngineUnavailable,
}

/// Faults inside a countdown loop. These never leave the task; they are
/// reported as an `Errored` progress event.
#[derive(Debug, Error)]
pub enum TaskFault {
    #[error("progress ratio overflowed at tick {elapsed} of {total}")]
    RatioOverflow { elapsed: u64, total: u64 },

    #[error("remaining seconds {0} cannot be represented")]
    RemainingOverflow(u64),

    #[error("progress channel closed")]
    ChannelClosed,

    #[error("countdown panicked: {0}")]
    Panicked(String),
}
