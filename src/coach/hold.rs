//! Sustained-hold tracking
//!
//! Dance exercises end by holding the target posture continuously. The
//! timer advances on every analysis result: consecutive hold cues extend a
//! run, anything else resets it, and one threshold crossing latches the
//! completed state for the rest of the session.

use std::time::{Duration, Instant};

/// Current phase of the hold run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    /// No active hold run
    Idle,
    /// Posture held continuously since `started_at`
    Holding { started_at: Instant },
    /// Threshold crossed once; latched until reset
    Completed,
}

/// What one observation meant, for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldObservation {
    /// Not holding
    Idle,
    /// Hold in progress for `held_secs` whole seconds
    Holding { held_secs: u64 },
    /// This observation crossed the threshold; fires exactly once
    JustCompleted,
    /// Already completed earlier
    Completed,
}

/// Accumulates consecutive hold observations against a threshold.
///
/// Time is passed in by the caller, so tests can drive the timer with
/// synthetic instants instead of sleeping.
pub struct HoldTimer {
    threshold: Duration,
    state: HoldState,
}

impl HoldTimer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: HoldState::Idle,
        }
    }

    /// Record one analysis result.
    ///
    /// `is_hold` is whether the service signalled the hold posture, `now`
    /// the instant the result was observed. A non-hold result discards any
    /// accumulated run; after completion the timer ignores further input.
    pub fn observe(&mut self, is_hold: bool, now: Instant) -> HoldObservation {
        match self.state {
            HoldState::Completed => HoldObservation::Completed,
            HoldState::Idle => {
                if is_hold {
                    self.state = HoldState::Holding { started_at: now };
                    HoldObservation::Holding { held_secs: 0 }
                } else {
                    HoldObservation::Idle
                }
            }
            HoldState::Holding { started_at } => {
                if !is_hold {
                    self.state = HoldState::Idle;
                    return HoldObservation::Idle;
                }
                let held = now.duration_since(started_at);
                if held >= self.threshold {
                    self.state = HoldState::Completed;
                    HoldObservation::JustCompleted
                } else {
                    HoldObservation::Holding {
                        held_secs: held.as_secs(),
                    }
                }
            }
        }
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, HoldState::Completed)
    }

    /// Back to idle, clearing a completed latch as well.
    pub fn reset(&mut self) {
        self.state = HoldState::Idle;
    }
}
