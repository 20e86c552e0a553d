//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timers::{FleetSnapshot, LinkKey, TimerError};

/// Response for command endpoints: outcome plus the fleet afterwards
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fleet: FleetSnapshot,
}

impl ApiResponse {
    pub fn ok(message: String, fleet: FleetSnapshot) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            timestamp: Utc::now(),
            fleet,
        }
    }
}

/// Status response with server metadata
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub fleet: FleetSnapshot,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebuildRequest {
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DurationRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequest {
    pub key: LinkKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub label: String,
}

/// Error body returned for refused commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A timer error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub TimerError);

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            TimerError::NotConfigured { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TimerError::InvalidLinkKey { .. }
            | TimerError::InvalidFleetSize { .. }
            | TimerError::UnknownCommand { .. }
            | TimerError::CommandIndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
            TimerError::UnknownTimer { .. } => StatusCode::NOT_FOUND,
            TimerError::FleetBusy { .. } => StatusCode::CONFLICT,
            TimerError::StopTimeout { .. } | TimerError::EngineUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.0.to_string(),
            timestamp: Utc::now(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
