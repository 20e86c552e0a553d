//! Timer and batch state machines

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{StateFlags, StateRegister};

/// Lifecycle of a single timer run.
///
/// `Idle → Started → Running ⇄ Paused → {Stopped | Finished | Errored}`.
/// The terminal states end a run; the timer may be started again afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Started,
    Running,
    Paused,
    Stopped,
    Finished,
    Errored,
}

impl TimerState {
    /// True while a run is in progress.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::Running | Self::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Finished | Self::Errored)
    }

    /// Flag combination this state corresponds to.
    pub fn flags(self) -> StateFlags {
        match self {
            Self::Idle => StateFlags::NONE,
            Self::Started => StateFlags::STARTED,
            Self::Running => StateFlags::RUNNING,
            Self::Paused => StateFlags::WAITING,
            Self::Stopped => StateFlags::STOPPED,
            Self::Finished => StateFlags::FINISHED,
            Self::Errored => StateFlags::STOPPED | StateFlags::ERROR,
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Phase of the fleet-wide batch cycle, read off the batch register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    Idle,
    Running,
    Paused,
}

impl BatchPhase {
    pub fn of(register: &StateRegister) -> Self {
        if register.contains_any(StateFlags::STARTED) {
            Self::Running
        } else if register.contains_any(StateFlags::WAITING) {
            Self::Paused
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}
