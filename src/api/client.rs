//! Pose service HTTP client

use crate::api::types::{
    AckResponse, AuthResponse, AuthSession, CompletionLogRequest, Feedback, FrameRequest,
    FrameResponse, LoginRequest, ProgressPoint, ProgressResponse, RegisterRequest,
};
use crate::exercise::{Exercise, ExerciseKind};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("posecoach/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pose service client errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid or expired token")]
    Unauthorized,
}

/// Pose service HTTP client.
///
/// Submits frames as base64 JPEG data URLs and parses the feedback the
/// service returns, decoding the spoken-cue payload along the way.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Obtain a bearer token for an existing account.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = LoginRequest { email, password };
        let response = self
            .http
            .post(self.url("/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::parse_auth(response).await
    }

    /// Create an account and obtain a bearer token.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        re_password: &str,
    ) -> Result<AuthSession, ApiError> {
        let body = RegisterRequest {
            email,
            password,
            re_password,
        };
        let response = self
            .http
            .post(self.url("/register"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::parse_auth(response).await
    }

    async fn parse_auth(response: reqwest::Response) -> Result<AuthSession, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }

        // Auth errors arrive as JSON bodies on non-2xx statuses; anything
        // unparseable falls back to a plain status error.
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let auth: AuthResponse = match serde_json::from_str(&text) {
            Ok(auth) => auth,
            Err(e) if status.is_success() => return Err(ApiError::Parse(e.to_string())),
            Err(_) => return Err(ApiError::Status(status.as_u16(), text)),
        };

        if !auth.success {
            return Err(ApiError::Rejected(
                auth.error.unwrap_or_else(|| "authentication failed".to_string()),
            ));
        }

        let token = auth
            .token
            .ok_or_else(|| ApiError::Parse("missing token in auth response".to_string()))?;

        Ok(AuthSession {
            token,
            user: auth.user,
        })
    }

    /// Submit one JPEG snapshot for analysis.
    ///
    /// The endpoint is chosen by the exercise kind; the image travels as a
    /// `data:image/jpeg;base64,...` URL, matching what the service expects.
    pub async fn submit_frame(
        &self,
        token: &str,
        exercise: Exercise,
        jpeg: &[u8],
    ) -> Result<Feedback, ApiError> {
        let path = match exercise.kind() {
            ExerciseKind::Workout => "/process_workout_frame",
            ExerciseKind::Dance => "/process_dance_frame",
        };

        let body = FrameRequest {
            exercise: exercise.wire_name(),
            image: format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)),
        };

        debug!(exercise = exercise.wire_name(), bytes = jpeg.len(), "Submitting frame");

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        let frame: FrameResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        // A malformed audio field degrades to a silent cue rather than
        // discarding the feedback text with it.
        let audio = if frame.audio.is_empty() {
            Vec::new()
        } else {
            match BASE64.decode(&frame.audio) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Discarding undecodable cue audio: {}", e);
                    Vec::new()
                }
            }
        };

        Ok(Feedback {
            text: frame.feedback,
            audio,
            should_speak: frame.should_speak,
        })
    }

    /// Record a dance challenge completion on the server.
    ///
    /// Called fire-and-forget from the session; the caller only logs failures.
    pub async fn log_dance_completion(
        &self,
        token: &str,
        exercise: Exercise,
    ) -> Result<(), ApiError> {
        let body = CompletionLogRequest {
            exercise: exercise.wire_name(),
        };
        let response = self
            .http
            .post(self.url("/api/log_dance_completion"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        let ack: AckResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        if !ack.success {
            return Err(ApiError::Rejected(
                ack.error.unwrap_or_else(|| "completion log refused".to_string()),
            ));
        }
        Ok(())
    }

    /// Fetch the per-day completion history.
    pub async fn progress(&self, token: &str) -> Result<Vec<ProgressPoint>, ApiError> {
        let response = self
            .http
            .get(self.url("/api/progress"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        let progress: ProgressResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        if !progress.success {
            return Err(ApiError::Rejected(
                progress.error.unwrap_or_else(|| "progress fetch refused".to_string()),
            ));
        }
        Ok(progress.progress)
    }
}
