//! Daily challenge
//!
//! Each calendar day gets one randomly assigned exercise. The record lives
//! in the state file and survives restarts; a record from an earlier day is
//! replaced on first access, and a completed record stays completed until
//! the date rolls over.

use crate::error::Result;
use crate::exercise::Exercise;
use crate::storage::StateStore;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Completion state of a day's challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Completed,
}

/// One day's challenge assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Local calendar date the assignment belongs to
    pub date: NaiveDate,
    pub exercise: Exercise,
    pub status: ChallengeStatus,
}

impl ChallengeRecord {
    pub fn is_completed(&self) -> bool {
        self.status == ChallengeStatus::Completed
    }
}

/// Today's challenge, assigning a fresh one when the stored record is
/// missing or from an earlier day.
pub fn get_or_create(store: &StateStore, today: NaiveDate) -> Result<ChallengeRecord> {
    if let Some(record) = store.challenge()? {
        if record.date == today {
            return Ok(record);
        }
        debug!("Discarding stale challenge from {}", record.date);
    }

    let exercise = random_exercise();
    let record = ChallengeRecord {
        date: today,
        exercise,
        status: ChallengeStatus::Pending,
    };
    store.set_challenge(&record)?;
    info!("Assigned daily challenge: {}", exercise);
    Ok(record)
}

/// Mark today's challenge complete.
///
/// Returns whether the record changed. A record from another day, for a
/// different exercise, or already completed is left untouched, so a second
/// completion in the same day never re-announces.
pub fn mark_completed(store: &StateStore, today: NaiveDate, exercise: Exercise) -> Result<bool> {
    let mut record = match store.challenge()? {
        Some(record) => record,
        None => return Ok(false),
    };
    if record.date != today || record.exercise != exercise || record.is_completed() {
        return Ok(false);
    }

    record.status = ChallengeStatus::Completed;
    store.set_challenge(&record)?;
    info!("Daily challenge completed: {}", exercise);
    Ok(true)
}

fn random_exercise() -> Exercise {
    let mut rng = rand::thread_rng();
    Exercise::ALL[rng.gen_range(0..Exercise::ALL.len())]
}
