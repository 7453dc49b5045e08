//! Event types for the coaching session
//!
//! Broadcast on a `tokio::sync::broadcast` channel; the CLI subscribes to
//! drive terminal output, and every event carries the session id so log
//! lines from overlapping sessions can be told apart.

use crate::exercise::Exercise;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A coaching session began ticking
    SessionStarted {
        session_id: Uuid,
        exercise: Exercise,
        challenge: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-visible feedback line (service feedback or an error message)
    FeedbackReceived {
        session_id: Uuid,
        text: String,
        is_hold: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A hold run is in progress
    HoldProgress {
        session_id: Uuid,
        held_secs: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The hold threshold was sustained; emitted exactly once per session
    ChallengeCompleted {
        session_id: Uuid,
        exercise: Exercise,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session stopped ticking (teardown or fatal capture failure)
    SessionStopped {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::FeedbackReceived { session_id, .. }
            | SessionEvent::HoldProgress { session_id, .. }
            | SessionEvent::ChallengeCompleted { session_id, .. }
            | SessionEvent::SessionStopped { session_id, .. } => *session_id,
        }
    }
}
