//! In-process stand-in for the pose service.
//!
//! Scripted replies are consumed in order; once the script runs out every
//! frame gets the default reply. Each frame submission is recorded so tests
//! can assert on what actually went over the wire.

// Each test binary uses its own subset of this helper.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_EMAIL: &str = "coach@example.com";
pub const TEST_PASSWORD: &str = "hunter2";
pub const TEST_TOKEN: &str = "test-token-1";

/// One scripted reply for the frame endpoints.
#[derive(Clone)]
pub struct ScriptedReply {
    pub feedback: String,
    pub audio: Vec<u8>,
    /// Raw value for the audio field, overriding `audio`, for malformed-input tests
    pub audio_b64: Option<String>,
    pub should_speak: bool,
    pub delay: Duration,
}

impl ScriptedReply {
    pub fn new(feedback: &str) -> Self {
        Self {
            feedback: feedback.to_string(),
            audio: vec![1, 2, 3],
            audio_b64: None,
            should_speak: true,
            delay: Duration::ZERO,
        }
    }

    pub fn silent(feedback: &str) -> Self {
        Self {
            feedback: feedback.to_string(),
            audio: Vec::new(),
            audio_b64: None,
            should_speak: false,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn raw_audio(mut self, value: &str) -> Self {
        self.audio_b64 = Some(value.to_string());
        self
    }
}

/// What one frame submission looked like on the wire.
#[derive(Clone)]
pub struct SeenFrame {
    pub endpoint: String,
    pub bearer: Option<String>,
    pub exercise: String,
    pub image: String,
}

#[derive(Default)]
pub struct StubState {
    script: Mutex<VecDeque<ScriptedReply>>,
    default_reply: Mutex<Option<ScriptedReply>>,
    frames: Mutex<Vec<SeenFrame>>,
    completion_logs: AtomicUsize,
}

pub struct StubService {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubService {
    /// Queue replies consumed one per frame submission.
    pub fn script(&self, replies: Vec<ScriptedReply>) {
        self.state.script.lock().unwrap().extend(replies);
    }

    /// Reply used once the script is exhausted.
    pub fn set_default(&self, reply: ScriptedReply) {
        *self.state.default_reply.lock().unwrap() = Some(reply);
    }

    pub fn frames_seen(&self) -> Vec<SeenFrame> {
        self.state.frames.lock().unwrap().clone()
    }

    pub fn completion_logs(&self) -> usize {
        self.state.completion_logs.load(Ordering::SeqCst)
    }
}

/// Bind an ephemeral port and serve the stub in the background.
pub async fn start() -> StubService {
    let state = Arc::new(StubState::default());
    let app = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/process_workout_frame", post(workout_frame))
        .route("/process_dance_frame", post(dance_frame))
        .route("/api/log_dance_completion", post(log_completion))
        .route("/api/progress", get(progress))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubService {
        base_url: format!("http://{}", addr),
        state,
    }
}

async fn login(Json(body): Json<Value>) -> Json<Value> {
    if body["email"] == TEST_EMAIL && body["password"] == TEST_PASSWORD {
        Json(json!({
            "success": true,
            "token": TEST_TOKEN,
            "user": {"id": 7, "email": TEST_EMAIL},
        }))
    } else {
        Json(json!({"success": false, "error": "Invalid credentials"}))
    }
}

async fn register(Json(body): Json<Value>) -> Json<Value> {
    if body["password"] != body["re_password"] {
        return Json(json!({"success": false, "error": "Passwords do not match"}));
    }
    if body["email"] == TEST_EMAIL {
        return Json(json!({"success": false, "error": "Email already registered"}));
    }
    Json(json!({
        "success": true,
        "token": TEST_TOKEN,
        "user": {"id": 8, "email": body["email"]},
    }))
}

async fn workout_frame(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    frame_reply(&state, "/process_workout_frame", &headers, &body).await
}

async fn dance_frame(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    frame_reply(&state, "/process_dance_frame", &headers, &body).await
}

async fn frame_reply(
    state: &StubState,
    endpoint: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Response {
    let bearer = bearer_of(headers);
    state.frames.lock().unwrap().push(SeenFrame {
        endpoint: endpoint.to_string(),
        bearer: bearer.clone(),
        exercise: body["exercise"].as_str().unwrap_or_default().to_string(),
        image: body["image"].as_str().unwrap_or_default().to_string(),
    });

    if !token_ok(bearer.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid token"}))).into_response();
    }

    let reply = state.script.lock().unwrap().pop_front();
    let reply = reply
        .or_else(|| state.default_reply.lock().unwrap().clone())
        .unwrap_or_else(|| ScriptedReply::silent("Keep going"));

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let audio = reply
        .audio_b64
        .unwrap_or_else(|| BASE64.encode(&reply.audio));
    Json(json!({
        "feedback": reply.feedback,
        "audio": audio,
        "audio_length": 0.5,
        "should_speak": reply.should_speak,
    }))
    .into_response()
}

async fn log_completion(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if !token_ok(bearer_of(&headers).as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid token"}))).into_response();
    }
    state.completion_logs.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": true})).into_response()
}

async fn progress(headers: HeaderMap) -> Response {
    if !token_ok(bearer_of(&headers).as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid token"}))).into_response();
    }
    Json(json!({
        "success": true,
        "progress": [
            {"date": "2025-06-01", "count": 2},
            {"date": "2025-06-02", "count": 1},
        ],
    }))
    .into_response()
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn token_ok(bearer: Option<&str>) -> bool {
    let expected = format!("Bearer {}", TEST_TOKEN);
    bearer == Some(expected.as_str())
}
