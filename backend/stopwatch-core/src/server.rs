// src/server.rs
use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{watch, Mutex as TokioMutex};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::clock::Clock;
use crate::display::{ElapsedDisplay, WatchSink};
use crate::error::{AppError, TrackerError};
use crate::session::StopwatchSession;
use crate::ticker::TickPeriod;
use crate::tracker::TrackerSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TokioMutex<StopwatchSession>>,
    pub frames: watch::Receiver<ElapsedDisplay>,
}

impl AppState {
    pub fn new(clock: Arc<dyn Clock>, period: TickPeriod) -> Result<Self, TrackerError> {
        let (sink, frames) = WatchSink::new();
        let session = StopwatchSession::new(clock, Arc::new(sink), period)?;
        Ok(Self {
            session: Arc::new(TokioMutex::new(session)),
            frames,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BoundaryRequest {
    pub start: Option<String>,
    pub end: Option<String>,
    pub running: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub running: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    #[serde(flatten)]
    pub display: ElapsedDisplay,
    pub formatted: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/stopwatch", get(handle_snapshot))
        .route("/stopwatch/display", get(handle_display))
        .route("/stopwatch/boundary", put(handle_boundary))
        .route("/stopwatch/control", put(handle_control))
        .route("/stopwatch/start", post(handle_start))
        .route("/stopwatch/stop", post(handle_stop))
        .route("/stopwatch/reset", post(handle_reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_snapshot(State(state): State<AppState>) -> Json<TrackerSnapshot> {
    Json(state.session.lock().await.snapshot())
}

async fn handle_display(State(state): State<AppState>) -> Json<FrameResponse> {
    let display = *state.frames.borrow();
    Json(FrameResponse {
        display,
        formatted: display.to_string(),
    })
}

async fn handle_boundary(
    State(state): State<AppState>,
    Json(body): Json<BoundaryRequest>,
) -> Json<TrackerSnapshot> {
    info!(
        "Boundary update: start={:?} end={:?} running={:?}",
        body.start, body.end, body.running
    );
    let mut session = state.session.lock().await;
    Json(session.boundary_changed(body.start.as_deref(), body.end.as_deref(), body.running))
}

async fn handle_control(
    State(state): State<AppState>,
    Json(body): Json<ControlRequest>,
) -> Json<TrackerSnapshot> {
    info!("External control update: running={:?}", body.running);
    let mut session = state.session.lock().await;
    Json(session.external_control_changed(body.running))
}

async fn handle_start(State(state): State<AppState>) -> Result<Json<TrackerSnapshot>, AppError> {
    let mut session = state.session.lock().await;
    if session.external_control().is_some() {
        return Err(AppError::ExternalControlActive);
    }
    session.start();
    Ok(Json(session.snapshot()))
}

async fn handle_stop(State(state): State<AppState>) -> Result<Json<TrackerSnapshot>, AppError> {
    let mut session = state.session.lock().await;
    if session.external_control().is_some() {
        return Err(AppError::ExternalControlActive);
    }
    session.stop();
    Ok(Json(session.snapshot()))
}

async fn handle_reset(State(state): State<AppState>) -> Json<TrackerSnapshot> {
    let mut session = state.session.lock().await;
    Json(session.reset())
}
