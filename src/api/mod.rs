//! Pose service HTTP boundary
//!
//! `client` wraps the reqwest plumbing; `types` holds the serde wire types
//! shared with the service.

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiError};
pub use types::{AuthSession, Feedback, ProgressPoint, HOLD_SIGNAL};
