//! Progress journal background task

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{state::TimerState, timers::ProgressEvent};

/// Log every accepted progress event until the fleet goes away.
pub async fn progress_journal_task(mut updates: broadcast::Receiver<ProgressEvent>) {
    info!("Starting progress journal task");

    loop {
        match updates.recv().await {
            Ok(event) => record(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress journal fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    info!("Progress journal task finished");
}

fn record(event: &ProgressEvent) {
    match event.state {
        TimerState::Errored => {
            warn!(timer = %event.timer_id, "{} {}%", event.message, event.ratio_percent)
        }
        _ => debug!(timer = %event.timer_id, "{} {}%", event.message, event.ratio_percent),
    }
}
