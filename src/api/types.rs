//! Wire types for the pose service API

use serde::{Deserialize, Serialize};

/// Exact feedback text the service emits while a dance pose is being held
/// correctly. Classification is an exact string match per the service
/// contract; nothing else counts as a hold signal.
pub const HOLD_SIGNAL: &str = "Hold!";

/// `POST /login` request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /register` request body
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub re_password: &'a str,
}

/// Response shape shared by `/login` and `/register`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Account details returned alongside a fresh token
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
}

/// A successful authentication: the token plus whatever account details the
/// service included.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: Option<UserInfo>,
}

/// Frame submission body for both analysis endpoints.
///
/// `image` is a base64 JPEG data URL (`data:image/jpeg;base64,...`); the
/// service splits on the comma and decodes the remainder.
#[derive(Debug, Serialize)]
pub struct FrameRequest<'a> {
    pub exercise: &'a str,
    pub image: String,
}

/// Raw analysis response. `audio` is base64-encoded MP3, possibly empty;
/// unknown extra fields (`audio_length` and friends) are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameResponse {
    pub feedback: String,
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub should_speak: bool,
}

/// Parsed analysis result with the audio payload decoded.
///
/// Ephemeral: produced once per successful submission and consumed by the
/// arbitrator and hold timer on the same tick.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub text: String,
    pub audio: Vec<u8>,
    pub should_speak: bool,
}

impl Feedback {
    /// True when the service says the pose is being held correctly.
    pub fn is_hold(&self) -> bool {
        self.text == HOLD_SIGNAL
    }
}

/// `POST /api/log_dance_completion` request body
#[derive(Debug, Serialize)]
pub struct CompletionLogRequest<'a> {
    pub exercise: &'a str,
}

/// Minimal acknowledgement shape used by the logging endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/progress` response
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressResponse {
    pub success: bool,
    #[serde(default)]
    pub progress: Vec<ProgressPoint>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One day of completion history. The service formats the date; the client
/// only prints it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub date: String,
    pub count: u32,
}
