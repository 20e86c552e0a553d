//! State shared with the HTTP handlers

use std::{sync::Mutex, time::Instant};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{tasks::FleetHandle, utils::format_uptime};

/// Fleet handle plus server metadata.
pub struct AppState {
    pub fleet: FleetHandle,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl AppState {
    pub fn new(fleet: FleetHandle, port: u16, host: String) -> Self {
        Self {
            fleet,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
        }
    }

    /// Remember the latest operator action for status reporting.
    pub fn record_action(&self, action: impl Into<String>) {
        match self.last_action.lock() {
            Ok(mut last) => *last = Some((action.into(), Utc::now())),
            Err(e) => warn!("Failed to record last action: {}", e),
        }
    }

    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|last| last.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }

    pub fn get_uptime(&self) -> String {
        format_uptime(self.start_time.elapsed())
    }
}
