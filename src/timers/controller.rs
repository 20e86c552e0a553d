//! Operator-facing timer wrapping a countdown task

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{CountdownTask, LinkKey, ProgressEvent, TaskTiming, TimerError, TimerId};
use crate::{state::TimerState, utils::format_clock};

/// What a `start` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOutcome {
    Started,
    Paused,
    Resumed,
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
        };
        f.write_str(name)
    }
}

/// Notification that a timer moved to another link group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChanged {
    pub timer_id: TimerId,
    pub key: LinkKey,
}

/// Point-in-time view of one timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub state: TimerState,
    /// `state` as the combinable mode flags observers may expect.
    pub flags: u8,
    pub duration_seconds: u64,
    pub link_key: LinkKey,
    pub seconds_remaining: Option<i64>,
    pub remaining_display: String,
    pub ratio_percent: u8,
    pub duration_editable: bool,
    pub commands: Vec<String>,
    pub last_message: Option<String>,
}

/// One timer slot: configured duration, link key, post-completion commands
/// and the countdown task that runs it.
pub struct TimerController {
    id: TimerId,
    duration_seconds: u64,
    link_key: LinkKey,
    state: TimerState,
    last_event: Option<ProgressEvent>,
    /// Run most recently ended by an operator stop.
    stopped_run: Option<u32>,
    commands: Vec<String>,
    task: CountdownTask,
}

impl TimerController {
    pub fn new(
        id: TimerId,
        timing: TaskTiming,
        events: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            task: CountdownTask::new(id.clone(), timing, events),
            id,
            duration_seconds: 0,
            link_key: LinkKey::default(),
            state: TimerState::Idle,
            last_event: None,
            stopped_run: None,
            commands: Vec::new(),
        }
    }

    pub fn id(&self) -> &TimerId {
        &self.id
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// Takes effect on the next start.
    pub fn configure_duration(&mut self, seconds: u64) {
        debug!("Timer {} duration set to {}s", self.id, seconds);
        self.duration_seconds = seconds;
    }

    pub fn is_configured(&self) -> bool {
        self.duration_seconds > 0
    }

    /// Duration edits are meant for timers that are not mid-run.
    pub fn is_duration_editable(&self) -> bool {
        !self.state.is_active()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Start an idle timer, or toggle pause/resume on a running one.
    pub async fn start(&mut self) -> Result<StartOutcome, TimerError> {
        if !self.is_configured() {
            warn!("Timer {} has no duration, refusing start", self.id);
            return Err(TimerError::NotConfigured { id: self.id.clone() });
        }

        // A run that already reported its end may still be unwinding.
        if self.state.is_terminal() {
            self.task.stop().await?;
        }

        if !self.task.is_running() {
            self.task.start(self.duration_seconds);
            self.state = TimerState::Started;
            return Ok(StartOutcome::Started);
        }

        if self.state == TimerState::Paused {
            self.task.resume();
            self.state = TimerState::Running;
            info!("Timer {} resumed", self.id);
            Ok(StartOutcome::Resumed)
        } else {
            self.task.pause();
            self.state = TimerState::Paused;
            info!("Timer {} paused", self.id);
            Ok(StartOutcome::Paused)
        }
    }

    /// Stop a running timer. The timer reads as `Stopped` afterwards even if
    /// the task's own last event said otherwise.
    pub async fn stop(&mut self) -> Result<(), TimerError> {
        if !self.task.is_running() {
            return Ok(());
        }
        let result = self.task.stop().await;
        self.stopped_run = Some(self.task.run());
        self.state = TimerState::Stopped;
        info!("Timer {} stopped", self.id);
        result
    }

    /// Fold a progress event into the controller. Returns `false` for events
    /// from an earlier run, which are ignored.
    pub fn on_progress_event(&mut self, event: &ProgressEvent) -> bool {
        if event.run != self.task.run() {
            debug!("Timer {} ignoring event from run {}", self.id, event.run);
            return false;
        }

        match event.state {
            TimerState::Running if self.state == TimerState::Started => {
                self.state = TimerState::Running;
            }
            TimerState::Stopped | TimerState::Finished | TimerState::Errored
                if self.state != TimerState::Stopped =>
            {
                self.state = event.state;
            }
            _ => {}
        }

        self.last_event = Some(event.clone());
        true
    }

    /// True when `event` reports a run that counted down to zero on its own,
    /// whether or not that run is still the current one.
    pub fn is_natural_completion(&self, event: &ProgressEvent) -> bool {
        event.timer_id == self.id
            && event.is_completion()
            && event.run <= self.task.run()
            && self.stopped_run != Some(event.run)
    }

    pub fn link_key(&self) -> LinkKey {
        self.link_key
    }

    /// Returns the change notification, or `None` if the key is unchanged.
    pub fn set_link_key(&mut self, key: LinkKey) -> Option<LinkChanged> {
        if self.link_key == key {
            return None;
        }
        self.link_key = key;
        Some(LinkChanged {
            timer_id: self.id.clone(),
            key,
        })
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn add_command(&mut self, label: String) {
        self.commands.push(label);
    }

    pub fn remove_command(&mut self, index: usize) -> Result<String, TimerError> {
        if index >= self.commands.len() {
            return Err(TimerError::CommandIndexOutOfRange {
                id: self.id.clone(),
                index,
            });
        }
        Ok(self.commands.remove(index))
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let seconds_remaining = self
            .last_event
            .as_ref()
            .map(|e| e.seconds_remaining)
            .filter(|s| *s >= 0);
        let remaining_display = format_clock(seconds_remaining.map_or(0, |s| s.unsigned_abs()));

        TimerSnapshot {
            id: self.id.clone(),
            state: self.state,
            flags: self.state.flags().bits(),
            duration_seconds: self.duration_seconds,
            link_key: self.link_key,
            seconds_remaining,
            remaining_display,
            ratio_percent: self.last_event.as_ref().map_or(0, |e| e.ratio_percent),
            duration_editable: self.is_duration_editable(),
            commands: self.commands.clone(),
            last_message: self.last_event.as_ref().map(|e| e.message.clone()),
        }
    }
}
