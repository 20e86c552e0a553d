use std::{path::Path, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use multi_timer::{
    api::create_router,
    services::CommandLauncher,
    state::AppState,
    tasks::FleetHandle,
    timers::{FleetConfig, FleetController},
};

struct NoopLauncher;

impl CommandLauncher for NoopLauncher {
    fn launch(&self, _label: &str, _path: &Path) {}
}

async fn app(count: usize) -> (Router, FleetHandle) {
    let (fleet, events) = FleetController::new(FleetConfig::default(), Arc::new(NoopLauncher));
    let (handle, _join) = FleetHandle::spawn(fleet, events);
    handle.rebuild(count).await.unwrap();
    let state = Arc::new(AppState::new(handle.clone(), 0, "127.0.0.1".to_string()));
    (create_router(state), handle)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn timer_ids(body: &Value) -> Vec<String> {
    body["fleet"]["timers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn status_lists_the_fleet() {
    let (app, _handle) = app(3).await;
    let (status, body) = call(&app, Method::GET, "/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer_ids(&body).len(), 3);
    assert_eq!(body["fleet"]["aggregate_percent"], 0);
    assert_eq!(body["fleet"]["batch"], "idle");
    assert_eq!(body["fleet"]["timers"][0]["link_key"], "A");
    assert_eq!(body["fleet"]["timers"][0]["remaining_display"], "00:00:00");
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _handle) = app(1).await;
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn start_without_duration_is_unprocessable() {
    let (app, _handle) = app(1).await;
    let (_, body) = call(&app, Method::GET, "/status", None).await;
    let id = &timer_ids(&body)[0];

    let (status, body) = call(&app, Method::POST, &format!("/timers/{}/start", id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn duration_link_and_start_flow() {
    let (app, handle) = app(3).await;
    let (_, body) = call(&app, Method::GET, "/status", None).await;
    let ids = timer_ids(&body);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/timers/{}/link", ids[2]),
        Some(json!({ "key": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/timers/{}/duration", ids[0]),
        Some(json!({ "seconds": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fleet"]["timers"][1]["duration_seconds"], 120);
    assert_eq!(body["fleet"]["timers"][2]["duration_seconds"], 0);

    let (status, body) = call(&app, Method::POST, &format!("/timers/{}/start", ids[0]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Timer {} started", ids[0]));

    let (status, _) = call(&app, Method::POST, "/fleet/rebuild", Some(json!({ "count": 4 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::POST, &format!("/timers/{}/stop", ids[1]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fleet"]["timers"][0]["state"], "stopped");
    assert_eq!(body["fleet"]["timers"][1]["state"], "stopped");

    let (_, status_body) = call(&app, Method::GET, "/status", None).await;
    assert_eq!(status_body["last_action"], format!("stop:{}", ids[1]));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (app, _handle) = app(2).await;
    let (_, body) = call(&app, Method::GET, "/status", None).await;
    let id = &timer_ids(&body)[0];

    let (status, _) = call(&app, Method::POST, "/timers/missing/stop", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/timers/{}/link", id),
        Some(json!({ "key": "Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/fleet/rebuild", Some(json!({ "count": 13 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/timers/{}/commands", id),
        Some(json!({ "label": "Run Nothing" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, &format!("/timers/{}/commands/0", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commands_can_be_added_and_removed() {
    let (app, _handle) = app(1).await;
    let (_, body) = call(&app, Method::GET, "/status", None).await;
    let id = &timer_ids(&body)[0];

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/timers/{}/commands", id),
        Some(json!({ "label": "Run Terminal" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fleet"]["timers"][0]["commands"], json!(["Run Terminal"]));

    let (status, body) = call(&app, Method::DELETE, &format!("/timers/{}/commands/0", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fleet"]["timers"][0]["commands"], json!([]));
}
