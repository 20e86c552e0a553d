//! Pausable, cancellable countdown task
//!
//! Each run is spawned onto the tokio runtime and reports through the shared
//! progress channel. The task itself decides when a run ends; outside callers
//! only flip its stop and pause signals.

use std::{any::Any, panic::AssertUnwindSafe, thread, time::Duration};

use futures::FutureExt;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    event::{ratio_percent, REMAINING_UNKNOWN},
    ProgressEvent, TaskFault, TimerError, TimerId,
};
use crate::state::TimerState;

/// Tick period and stop deadline shared by every task in a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub tick: Duration,
    pub stop_timeout: Duration,
}

impl Default for TaskTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

/// Handles to the run currently (or most recently) spawned.
struct ActiveRun {
    cancel: CancellationToken,
    pause_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// A countdown worker bound to one timer.
pub struct CountdownTask {
    id: TimerId,
    timing: TaskTiming,
    events: mpsc::UnboundedSender<ProgressEvent>,
    runs: u32,
    active: Option<ActiveRun>,
}

impl CountdownTask {
    pub fn new(id: TimerId, timing: TaskTiming, events: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            id,
            timing,
            events,
            runs: 0,
            active: None,
        }
    }

    /// Generation of the latest run; 0 before the first start.
    pub fn run(&self) -> u32 {
        self.runs
    }

    pub fn is_running(&self) -> bool {
        self.live().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.live().is_some_and(|run| *run.pause_tx.borrow())
    }

    fn live(&self) -> Option<&ActiveRun> {
        self.active.as_ref().filter(|run| !run.join.is_finished())
    }

    /// Spawn a countdown from `total_seconds` to zero.
    ///
    /// Refused (logged, returns `false`) while a previous run is still alive.
    pub fn start(&mut self, total_seconds: u64) -> bool {
        if self.is_running() {
            warn!("Timer {} is already running, ignoring start", self.id);
            return false;
        }

        self.runs += 1;
        let cancel = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        let countdown = Countdown {
            id: self.id.clone(),
            run: self.runs,
            total: total_seconds,
            tick: self.timing.tick,
            events: self.events.clone(),
            cancel: cancel.clone(),
            paused: pause_rx,
            elapsed: 0,
            remaining: REMAINING_UNKNOWN,
            ratio: 0,
        };

        // Sent before spawning so it always precedes the first tick.
        if let Err(e) = countdown.emit(TimerState::Started, "Started...") {
            warn!("Timer {} could not announce start: {}", self.id, e);
        }
        info!("Timer {} started run {} for {}s", self.id, self.runs, total_seconds);

        let join = tokio::spawn(countdown.execute());
        self.active = Some(ActiveRun {
            cancel,
            pause_tx,
            join,
        });
        true
    }

    /// Ask the run to wait at its next tick boundary.
    pub fn pause(&self) {
        if let Some(run) = self.live() {
            run.pause_tx.send_replace(true);
            debug!("Timer {} pause requested", self.id);
        }
    }

    /// Release a paused run.
    pub fn resume(&self) {
        if let Some(run) = self.live() {
            run.pause_tx.send_replace(false);
            debug!("Timer {} resume requested", self.id);
        }
    }

    /// Cancel the run and wait for it to exit, up to the stop deadline.
    ///
    /// Repeated calls are no-ops. A run that overruns the deadline is aborted
    /// and reported as [`TimerError::StopTimeout`].
    pub async fn stop(&mut self) -> Result<(), TimerError> {
        let Some(ActiveRun {
            cancel,
            pause_tx,
            join,
        }) = self.active.take()
        else {
            return Ok(());
        };

        cancel.cancel();
        let abort = join.abort_handle();
        let waited = self.timing.stop_timeout;
        let outcome = timeout(waited, join).await;
        drop(pause_tx);

        match outcome {
            Ok(Ok(())) => {
                debug!("Timer {} run {} exited", self.id, self.runs);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Timer {} run {} ended abnormally: {}", self.id, self.runs, e);
                Ok(())
            }
            Err(_) => {
                abort.abort();
                warn!("Timer {} did not stop within {:?}, aborted", self.id, waited);
                Err(TimerError::StopTimeout {
                    id: self.id.clone(),
                    waited,
                })
            }
        }
    }
}

impl Drop for CountdownTask {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
            run.join.abort();
        }
    }
}

enum Exit {
    Finished,
    Stopped,
}

/// State owned by a spawned run.
struct Countdown {
    id: TimerId,
    run: u32,
    total: u64,
    tick: Duration,
    events: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
    paused: watch::Receiver<bool>,
    elapsed: u64,
    remaining: i64,
    ratio: u8,
}

impl Countdown {
    async fn execute(mut self) {
        let outcome = AssertUnwindSafe(self.count_down()).catch_unwind().await;
        let (state, message) = self.conclude(outcome);
        if let Err(e) = self.emit(state, &message) {
            debug!("Timer {} final event dropped: {}", self.id, e);
        }
    }

    /// Terminal state and message for how the loop ended.
    fn conclude(&self, outcome: thread::Result<Result<Exit, TaskFault>>) -> (TimerState, String) {
        match outcome {
            Ok(Ok(Exit::Finished)) => {
                info!("Timer {} finished", self.id);
                (TimerState::Finished, "Finished...".to_string())
            }
            Ok(Ok(Exit::Stopped)) => {
                info!("Timer {} stopped at tick {}", self.id, self.elapsed);
                (TimerState::Stopped, "Stopped...".to_string())
            }
            Ok(Err(fault)) => {
                error!("Timer {} failed: {}", self.id, fault);
                (TimerState::Errored, format!("Error...{}", fault))
            }
            Err(payload) => {
                let fault = TaskFault::Panicked(panic_message(payload.as_ref()));
                error!("Timer {} failed: {}", self.id, fault);
                (TimerState::Errored, format!("Error...{}", fault))
            }
        }
    }

    async fn count_down(&mut self) -> Result<Exit, TaskFault> {
        while self.elapsed <= self.total {
            let remaining = self.total - self.elapsed;
            self.remaining = i64::try_from(remaining).map_err(|_| TaskFault::RemainingOverflow(remaining))?;

            if self.cancel.is_cancelled() {
                return Ok(Exit::Stopped);
            }

            let paused = *self.paused.borrow();
            if paused {
                self.emit(TimerState::Running, "Waiting...")?;
                let resumed = tokio::select! {
                    _ = self.cancel.cancelled() => false,
                    changed = self.paused.wait_for(|paused| !*paused).map(|r| r.is_ok()) => changed,
                };
                if !resumed {
                    return Ok(Exit::Stopped);
                }
            }

            self.ratio = ratio_percent(self.elapsed, self.total)?;
            self.emit(TimerState::Running, "Running...")?;

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(Exit::Stopped),
                _ = sleep(self.tick) => {}
            }
            self.elapsed += 1;
        }
        Ok(Exit::Finished)
    }

    fn emit(&self, state: TimerState, message: &str) -> Result<(), TaskFault> {
        let event = ProgressEvent {
            timer_id: self.id.clone(),
            run: self.run,
            seconds_remaining: self.remaining,
            state,
            elapsed_ticks: self.elapsed,
            ratio_percent: self.ratio,
            message: message.to_string(),
        };
        self.events.send(event).map_err(|_| TaskFault::ChannelClosed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> (CountdownTask, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CountdownTask::new(TimerId::from("t1"), TaskTiming::default(), tx), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> ProgressEvent {
        rx.recv().await.expect("progress channel closed")
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_ticks_then_finishes() {
        let (mut task, mut rx) = task();
        assert!(task.start(3));

        let started = next(&mut rx).await;
        assert_eq!(started.state, TimerState::Started);
        assert_eq!(started.seconds_remaining, REMAINING_UNKNOWN);

        let mut running = Vec::new();
        let finished = loop {
            let event = next(&mut rx).await;
            match event.state {
                TimerState::Running => running.push(event),
                _ => break event,
            }
        };

        let ratios: Vec<u8> = running.iter().map(|e| e.ratio_percent).collect();
        let remaining: Vec<i64> = running.iter().map(|e| e.seconds_remaining).collect();
        assert_eq!(ratios, vec![0, 33, 66, 100]);
        assert_eq!(remaining, vec![3, 2, 1, 0]);
        assert_eq!(finished.state, TimerState::Finished);
        assert_eq!(finished.ratio_percent, 100);
        assert!(finished.is_completion());
        task.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_finishes_with_zero_ratio() {
        let (mut task, mut rx) = task();
        task.start(0);

        let events = [next(&mut rx).await, next(&mut rx).await, next(&mut rx).await];
        assert_eq!(events[0].state, TimerState::Started);
        assert_eq!(events[1].state, TimerState::Running);
        assert_eq!(events[1].ratio_percent, 0);
        assert_eq!(events[2].state, TimerState::Finished);
        assert_eq!(events[2].ratio_percent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_twice_emits_one_terminal_event() {
        let (mut task, mut rx) = task();
        task.start(100);
        next(&mut rx).await;
        next(&mut rx).await;

        assert_eq!(task.stop().await, Ok(()));
        assert!(!task.is_running());
        assert_eq!(task.stop().await, Ok(()));

        let terminal: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.state.is_terminal())
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].state, TimerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_resume_keeps_tick_count() {
        let (mut task, mut rx) = task();
        task.start(5);
        next(&mut rx).await;
        let first = next(&mut rx).await;
        assert_eq!(first.elapsed_ticks, 0);

        task.pause();
        assert!(task.is_paused());
        let waiting = next(&mut rx).await;
        assert_eq!(waiting.message, "Waiting...");
        assert_eq!(waiting.state, TimerState::Running);
        assert_eq!(waiting.elapsed_ticks, 1);

        // Nothing moves while paused.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(drain(&mut rx).is_empty());

        task.resume();
        let resumed = next(&mut rx).await;
        assert_eq!(resumed.elapsed_ticks, 1);
        assert_eq!(resumed.ratio_percent, 20);
        let after = next(&mut rx).await;
        assert_eq!(after.elapsed_ticks, 2);

        task.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_a_paused_run() {
        let (mut task, mut rx) = task();
        task.start(5);
        next(&mut rx).await;
        next(&mut rx).await;
        task.pause();
        next(&mut rx).await;

        assert_eq!(task.stop().await, Ok(()));
        let events = drain(&mut rx);
        assert_eq!(events.last().map(|e| e.state), Some(TimerState::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_refused() {
        let (mut task, mut rx) = task();
        assert!(task.start(10));
        assert!(!task.start(10));
        assert_eq!(task.run(), 1);

        task.stop().await.unwrap();
        let started = drain(&mut rx)
            .into_iter()
            .filter(|e| e.state == TimerState::Started)
            .count();
        assert_eq!(started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_task_ignores_controls() {
        let (mut task, mut rx) = task();
        task.pause();
        task.resume();
        assert_eq!(task.stop().await, Ok(()));
        assert!(!task.is_paused());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_bumps_run_generation() {
        let (mut task, mut rx) = task();
        task.start(0);
        loop {
            if next(&mut rx).await.state == TimerState::Finished {
                break;
            }
        }
        task.stop().await.unwrap();

        assert!(task.start(0));
        let started = next(&mut rx).await;
        assert_eq!(started.run, 2);
        task.stop().await.unwrap();
    }

    fn countdown(events: mpsc::UnboundedSender<ProgressEvent>) -> Countdown {
        let (_pause_tx, paused) = watch::channel(false);
        Countdown {
            id: TimerId::from("t2"),
            run: 1,
            total: 5,
            tick: Duration::from_secs(1),
            events,
            cancel: CancellationToken::new(),
            paused,
            elapsed: 2,
            remaining: 3,
            ratio: 40,
        }
    }

    #[tokio::test]
    async fn panic_in_loop_becomes_errored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let countdown = countdown(tx);

        let outcome = AssertUnwindSafe(async {
            if countdown.elapsed < countdown.total {
                panic!("tick {} exploded", countdown.elapsed);
            }
            Ok(Exit::Finished)
        })
        .catch_unwind()
        .await;

        let (state, message) = countdown.conclude(outcome);
        assert_eq!(state, TimerState::Errored);
        assert_eq!(message, "Error...countdown panicked: tick 2 exploded");
    }

    #[test]
    fn panic_payloads_are_described() {
        let literal: Box<dyn Any + Send> = Box::new("static message");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(literal.as_ref()), "static message");
        assert_eq!(panic_message(owned.as_ref()), "owned message");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[tokio::test(start_paused = true)]
    async fn loop_fault_becomes_errored_event() {
        let (mut task, mut rx) = task();
        task.start(u64::MAX);
        assert_eq!(next(&mut rx).await.state, TimerState::Started);

        let errored = next(&mut rx).await;
        assert_eq!(errored.state, TimerState::Errored);
        assert!(errored.message.starts_with("Error..."));
        task.stop().await.unwrap();
    }
}
