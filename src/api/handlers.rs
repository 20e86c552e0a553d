//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use super::responses::{
    ApiError, ApiResponse, CommandRequest, DurationRequest, HealthResponse, LinkRequest,
    RebuildRequest, StatusResponse,
};
use crate::{state::AppState, timers::TimerId};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Record the action and answer with the fleet as it stands now.
async fn respond(state: &AppState, action: String, message: String) -> ApiResult<ApiResponse> {
    info!("{}", message);
    state.record_action(action);
    let fleet = state.fleet.snapshot().await?;
    Ok(Json(ApiResponse::ok(message, fleet)))
}

/// Handle POST /fleet/rebuild - Replace the fleet with fresh timers
pub async fn rebuild_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RebuildRequest>,
) -> ApiResult<ApiResponse> {
    state.fleet.rebuild(request.count).await?;
    respond(
        &state,
        "rebuild".to_string(),
        format!("Fleet rebuilt with {} timers", request.count),
    )
    .await
}

/// Handle POST /fleet/start - Batch start, pause or resume
pub async fn batch_start_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    let phase = state.fleet.batch_start().await?;
    respond(&state, "batch-start".to_string(), format!("Batch is now {}", phase)).await
}

/// Handle POST /fleet/stop - Stop every timer
pub async fn batch_stop_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    state.fleet.batch_stop().await?;
    respond(&state, "batch-stop".to_string(), "All timers stopped".to_string()).await
}

/// Handle PUT /timers/:id/duration - Configure a duration
pub async fn duration_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DurationRequest>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    state.fleet.configure_duration(id.clone(), request.seconds).await?;
    respond(
        &state,
        format!("duration:{}", id),
        format!("Timer {} set to {}s", id, request.seconds),
    )
    .await
}

/// Handle POST /timers/:id/start - Start, pause or resume one timer
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    let outcome = state.fleet.start(id.clone()).await?;
    respond(&state, format!("start:{}", id), format!("Timer {} {}", id, outcome)).await
}

/// Handle POST /timers/:id/stop - Stop one timer
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    state.fleet.stop(id.clone()).await?;
    respond(&state, format!("stop:{}", id), format!("Timer {} stopped", id)).await
}

/// Handle PUT /timers/:id/link - Move a timer to another link group
pub async fn link_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<LinkRequest>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    state.fleet.set_link_key(id.clone(), request.key).await?;
    respond(
        &state,
        format!("link:{}", id),
        format!("Timer {} linked to group {}", id, request.key),
    )
    .await
}

/// Handle POST /timers/:id/commands - Append a post-completion command
pub async fn add_command_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    let message = format!("Timer {} will run '{}'", id, request.label);
    state.fleet.add_command(id.clone(), request.label).await?;
    respond(&state, format!("add-command:{}", id), message).await
}

/// Handle DELETE /timers/:id/commands/:index - Drop a post-completion command
pub async fn remove_command_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<ApiResponse> {
    let id = TimerId::from(id);
    let label = state.fleet.remove_command(id.clone(), index).await?;
    respond(
        &state,
        format!("remove-command:{}", id),
        format!("Timer {} no longer runs '{}'", id, label),
    )
    .await
}

/// Handle GET /status - Return the fleet and server status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let fleet = state.fleet.snapshot().await?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        fleet,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
