//! # Pose Coach Client (posecoach)
//!
//! Real-time exercise coaching against a remote pose-analysis service.
//!
//! **Purpose:** Sample video frames on a fixed cadence, submit them for
//! pose analysis, speak the returned cues without overlap or nagging, and
//! track sustained holds toward the daily challenge.
//!
//! **Architecture:** Tick-driven session loop with background submissions,
//! a single-slot cue arbitrator in front of a symphonia + rubato + cpal
//! playback path, and a TOML state file for the token and challenge record.

pub mod api;
pub mod audio;
pub mod capture;
pub mod challenge;
pub mod coach;
pub mod config;
pub mod error;
pub mod events;
pub mod exercise;
pub mod storage;

pub use error::{Error, Result};
pub use exercise::Exercise;
