//! HTTP API over a replayed capture.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;
use wifi_gesture_cli::serve::{router, AppState, SharedState};
use wifi_gesture_detector::{DetectorConfig, ForestClassifier, StopReason};
use wifi_gesture_hardware::SourceSpec;

const MODEL: &str = r#"{
    "classes": ["circle", "no_gesture", "wave"],
    "n_features": 14,
    "trees": [ { "nodes": [
        { "split": { "feature": 0, "threshold": 5.0, "left": 1, "right": 2 } },
        { "leaf": { "distribution": [0.0, 1.0, 0.0] } },
        { "leaf": { "distribution": [0.1, 0.0, 0.9] } }
    ] } ]
}"#;

fn write_capture(path: &Path, lines: usize) {
    let mut file = std::fs::File::create(path).unwrap();
    let coefficients: Vec<&str> = (0..52).flat_map(|_| ["9", "0"]).collect();
    for seq in 0..lines {
        writeln!(file, "DATA,{seq},-47,[{}]", coefficients.join(",")).unwrap();
    }
}

fn state(capture: &Path, rate_hz: Option<f64>) -> SharedState {
    let model = ForestClassifier::from_json_str(MODEL).unwrap();
    AppState::new(
        DetectorConfig::default(),
        Arc::new(model),
        SourceSpec::Replay {
            path: capture.to_path_buf(),
            rate_hz,
        },
    )
}

async fn call(state: &SharedState, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router(state.clone())
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

async fn wait_until_idle(state: &SharedState) {
    for _ in 0..200 {
        if !state.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("detection session did not finish");
}

#[tokio::test]
async fn gesture_before_any_session() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.txt");
    write_capture(&capture, 1);
    let state = state(&capture, None);

    let (status, body) = call(&state, Method::GET, "/api/gesture").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gesture"], "No Gesture");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["detection_count"], 0);

    let (_, health) = call(&state, Method::GET, "/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["detecting"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replayed_session_reports_detection() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.txt");
    write_capture(&capture, 5);
    let state = state(&capture, None);

    let (_, body) = call(&state, Method::POST, "/api/start_detection").await;
    assert_eq!(body["status"], "started");
    wait_until_idle(&state).await;

    let (_, body) = call(&state, Method::GET, "/api/gesture").await;
    assert_eq!(body["gesture"], "wave");
    assert_eq!(body["confidence"], 0.9);
    assert_eq!(body["detection_count"], 1);

    let (_, snapshot) = call(&state, Method::GET, "/api/status").await;
    assert_eq!(snapshot["running"], false);
    assert_eq!(snapshot["samples_processed"], 5);
    assert_eq!(snapshot["last_event"]["label"], "wave");
    assert_eq!(snapshot["stop_reason"]["kind"], "end_of_stream");

    // A finished session can be restarted.
    let (_, body) = call(&state, Method::GET, "/api/start_detection").await;
    assert_eq!(body["status"], "started");
    wait_until_idle(&state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_start_while_running_is_rejected_and_stop_ends_it() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.txt");
    write_capture(&capture, 1000);
    let state = state(&capture, Some(10.0));

    let (_, body) = call(&state, Method::POST, "/api/start_detection").await;
    assert_eq!(body["status"], "started");
    let (_, body) = call(&state, Method::POST, "/api/start_detection").await;
    assert_eq!(body["status"], "already_running");

    let (_, body) = call(&state, Method::POST, "/api/stop_detection").await;
    assert_eq!(body["status"], "stopped");
    wait_until_idle(&state).await;

    assert_eq!(state.snapshot().stop_reason, Some(StopReason::Stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_capture_is_reported_in_status() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(&dir.path().join("absent.txt"), None);

    let (_, body) = call(&state, Method::POST, "/api/start_detection").await;
    assert_eq!(body["status"], "started");
    wait_until_idle(&state).await;

    let (_, snapshot) = call(&state, Method::GET, "/api/status").await;
    assert_eq!(snapshot["stop_reason"]["kind"], "transport_failed");
}

#[tokio::test]
async fn index_page_is_html() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(&dir.path().join("unused.txt"), None);
    let response = router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/api/gesture"));
}
