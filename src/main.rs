//! Multi Timer - concurrent countdown timers with link groups
//!
//! This is the main entry point for the multi-timer daemon.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use multi_timer::{
    api::create_router,
    config::Config,
    services::{check_catalog_paths, ProcessLauncher},
    state::AppState,
    tasks::{progress_journal_task, FleetHandle},
    timers::FleetController,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("multi_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting multi-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, timers={}, tick={}ms",
        config.host, config.port, config.timers, config.tick_ms
    );

    let fleet_config = config.fleet_config();
    let missing = check_catalog_paths(&fleet_config.catalog).await;
    if missing > 0 {
        warn!("{} post-completion commands cannot be launched on this host", missing);
    }

    // Build the fleet and hand it to its coordinating task
    let (fleet, events) = FleetController::new(fleet_config, Arc::new(ProcessLauncher));
    let (handle, fleet_join) = FleetHandle::spawn(fleet, events);
    handle.rebuild(config.timers).await?;

    tokio::spawn(progress_journal_task(handle.subscribe()));

    let state = Arc::new(AppState::new(handle.clone(), config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /status                      - Fleet status and aggregate progress");
    info!("  GET    /health                      - Health check");
    info!("  POST   /fleet/rebuild               - Replace the fleet");
    info!("  POST   /fleet/start                 - Batch start/pause/resume");
    info!("  POST   /fleet/stop                  - Batch stop");
    info!("  PUT    /timers/:id/duration         - Configure duration");
    info!("  POST   /timers/:id/start            - Start/pause/resume");
    info!("  POST   /timers/:id/stop             - Stop");
    info!("  PUT    /timers/:id/link             - Set link group");
    info!("  POST   /timers/:id/commands         - Add post-completion command");
    info!("  DELETE /timers/:id/commands/:index  - Remove post-completion command");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Stop every countdown before exiting
    if let Err(e) = handle.shutdown().await {
        warn!("Fleet shutdown failed: {}", e);
    }
    if let Err(e) = fleet_join.await {
        warn!("Fleet task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
