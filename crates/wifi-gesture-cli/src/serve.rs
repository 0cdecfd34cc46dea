//! HTTP front end.
//!
//! Serves a small status page and a JSON API over the same detection core
//! as the console front end. At most one detection session runs at a time;
//! `start_detection` while a session is live reports `already_running`.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | HTML status page |
//! | `GET /api/gesture` | `{gesture, confidence, detection_count}` |
//! | `GET /api/status` | full [`DetectionSnapshot`] |
//! | `GET\|POST /api/start_detection` | `{"status": "started" \| "already_running"}` |
//! | `GET\|POST /api/stop_detection` | `{"status": "stopped"}` |
//! | `GET /health` | liveness |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use clap::Args;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use wifi_gesture_core::GestureClassifier;
use wifi_gesture_detector::{
    status_channel, DetectionSnapshot, DetectorConfig, GesturePipeline, StatusReader, StopHandle,
    StopReason, StreamDriver,
};
use wifi_gesture_hardware::SourceSpec;

use crate::session::SessionArgs;

/// Label reported before any prediction.
pub const NO_GESTURE_DISPLAY: &str = "No Gesture";

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Session options
    #[command(flatten)]
    pub session: SessionArgs,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Start detection immediately instead of waiting for start_detection
    #[arg(long)]
    pub autostart: bool,
}

struct Session {
    stop: StopHandle,
    task: JoinHandle<()>,
}

/// Shared server state.
pub struct AppState {
    config: DetectorConfig,
    model: Arc<dyn GestureClassifier>,
    source: SourceSpec,
    session: Mutex<Option<Session>>,
    reader: RwLock<StatusReader>,
}

/// Handle to the shared state.
pub type SharedState = Arc<AppState>;

/// Outcome of [`AppState::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was spawned.
    Started,
    /// A session is still live.
    AlreadyRunning,
}

impl AppState {
    /// Create idle server state.
    pub fn new(
        config: DetectorConfig,
        model: Arc<dyn GestureClassifier>,
        source: SourceSpec,
    ) -> SharedState {
        let (_, reader) = status_channel();
        Arc::new(Self {
            config,
            model,
            source,
            session: Mutex::new(None),
            reader: RwLock::new(reader),
        })
    }

    /// Latest status of the current or last session.
    pub fn snapshot(&self) -> DetectionSnapshot {
        self.reader.read().snapshot()
    }

    /// Whether a session is live.
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Spawn a detection session unless one is live.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<StartOutcome> {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let pipeline = GesturePipeline::new(&self.config, self.model.clone())
            .context("Model does not fit the pipeline")?;
        let (publisher, reader) = status_channel();
        *self.reader.write() = reader;

        let driver = StreamDriver::new(pipeline, &self.config);
        let stop = driver.stop_handle();
        let spec = self.source.clone();

        let task = tokio::task::spawn_blocking(move || match spec.open() {
            Ok(source) => {
                driver.with_status(publisher).run(source);
            }
            Err(e) => {
                error!(source = %spec, error = %e, "Failed to open line source");
                let message = e.to_string();
                publisher.update(|s| {
                    s.running = false;
                    s.stop_reason = Some(StopReason::TransportFailed { message });
                });
            }
        });

        info!(source = %self.source, "Detection session started");
        *session = Some(Session { stop, task });
        Ok(StartOutcome::Started)
    }

    /// Ask the live session, if any, to stop.
    pub fn stop(&self) {
        if let Some(session) = self.session.lock().as_ref() {
            session.stop.stop();
        }
    }
}

/// Build the router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/gesture", get(gesture))
        .route("/api/status", get(status))
        .route("/api/start_detection", get(start_detection).post(start_detection))
        .route("/api/stop_detection", get(stop_detection).post(stop_detection))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.session.load_config()?;
    let model = args.session.load_model()?;
    let state = AppState::new(config, model, args.session.source_spec());

    if args.autostart {
        state.start()?;
    }

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("HTTP server listening on {}", args.bind);
    info!("Open http://localhost:{}/ in your browser", args.bind.port());

    let shutdown_state = state.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    shutdown_state.stop();
    Ok(())
}

async fn gesture(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot();
    let (label, confidence) = match &snapshot.latest {
        Some(latest) => (latest.label.clone(), latest.confidence),
        None => (NO_GESTURE_DISPLAY.to_string(), 0.0),
    };
    Json(json!({
        "gesture": label,
        "confidence": (confidence * 1000.0).round() / 1000.0,
        "detection_count": snapshot.detections,
    }))
}

async fn status(State(state): State<SharedState>) -> Json<DetectionSnapshot> {
    Json(state.snapshot())
}

async fn start_detection(State(state): State<SharedState>) -> impl IntoResponse {
    match state.start() {
        Ok(StartOutcome::Started) => (StatusCode::OK, Json(json!({ "status": "started" }))),
        Ok(StartOutcome::AlreadyRunning) => {
            (StatusCode::OK, Json(json!({ "status": "already_running" })))
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to start detection");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": format!("{e:#}") })),
            )
        }
    }
}

async fn stop_detection(State(state): State<SharedState>) -> Json<serde_json::Value> {
    state.stop();
    Json(json!({ "status": "stopped" }))
}

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "detecting": state.is_running(),
    }))
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>WiFi Gesture Detection</title>
<style>
body { font-family: sans-serif; max-width: 40em; margin: 2em auto; }
#gesture { font-size: 3em; font-weight: bold; }
button { font-size: 1em; margin-right: 0.5em; }
</style>
</head>
<body>
<h1>WiFi Gesture Detection</h1>
<div id="gesture">No Gesture</div>
<p>Confidence: <span id="confidence">0.000</span></p>
<p>Detections: <span id="count">0</span></p>
<button onclick="fetch('/api/start_detection', {method: 'POST'})">Start</button>
<button onclick="fetch('/api/stop_detection', {method: 'POST'})">Stop</button>
<script>
async function poll() {
  try {
    const r = await fetch('/api/gesture');
    const g = await r.json();
    document.getElementById('gesture').textContent = g.gesture;
    document.getElementById('confidence').textContent = g.confidence.toFixed(3);
    document.getElementById('count').textContent = g.detection_count;
  } catch (e) {}
}
setInterval(poll, 500);
poll();
</script>
</body>
</html>
"#;
