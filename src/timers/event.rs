//! Progress events emitted by countdown tasks

use serde::{Deserialize, Serialize};

use super::{TaskFault, TimerId};
use crate::state::TimerState;

/// Sentinel for `seconds_remaining` on the `Started` event.
pub const REMAINING_UNKNOWN: i64 = -1;

/// One observable transition or tick of a countdown run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timer_id: TimerId,
    /// Run generation; increments every time the task is started.
    pub run: u32,
    pub seconds_remaining: i64,
    pub state: TimerState,
    pub elapsed_ticks: u64,
    pub ratio_percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn is_completion(&self) -> bool {
        self.state == TimerState::Finished && self.seconds_remaining <= 0
    }
}

/// Whole percentage of `total` covered by `elapsed`, truncated.
///
/// A zero total yields 0 rather than dividing by zero.
pub fn ratio_percent(elapsed: u64, total: u64) -> Result<u8, TaskFault> {
    if total == 0 {
        return Ok(0);
    }
    let scaled = elapsed
        .checked_mul(100)
        .ok_or(TaskFault::RatioOverflow { elapsed, total })?;
    u8::try_from((scaled / total).min(100)).map_err(|_| TaskFault::RatioOverflow { elapsed, total })
}
