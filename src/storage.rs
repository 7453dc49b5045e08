//! Client state persistence
//!
//! A single TOML document under the state directory holds everything the
//! client remembers between runs: the bearer token and the daily challenge
//! record. Each key has exactly one writing module (the auth flow writes
//! `token`, the challenge module writes `challenge`); this file only provides
//! the load/save plumbing.

use crate::challenge::ChallengeRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_FILE_NAME: &str = "state.toml";

/// On-disk state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    /// Bearer token from the last successful login/register
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,

    /// Today's (or a past day's) challenge record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    challenge: Option<ChallengeRecord>,
}

/// Handle to the client state file.
///
/// Cheap to clone; every accessor reloads the document so concurrent
/// processes see each other's writes (single-writer-per-key keeps that safe).
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Open (and create if needed) the state directory.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(|e| {
            Error::Storage(format!(
                "Failed to create state directory {}: {}",
                state_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            path: state_dir.join(STATE_FILE_NAME),
        })
    }

    /// Stored bearer token, if any.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.load()?.token)
    }

    /// Persist the bearer token (auth flow only).
    pub fn set_token(&self, token: &str) -> Result<()> {
        let mut state = self.load()?;
        state.token = Some(token.to_string());
        self.save(&state)
    }

    /// Stored challenge record, if any.
    pub fn challenge(&self) -> Result<Option<ChallengeRecord>> {
        Ok(self.load()?.challenge)
    }

    /// Persist the challenge record (challenge module only).
    pub fn set_challenge(&self, record: &ChallengeRecord) -> Result<()> {
        let mut state = self.load()?;
        state.challenge = Some(record.clone());
        self.save(&state)
    }

    fn load(&self) -> Result<StateFile> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateFile::default());
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        toml::from_str(&text)
            .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", self.path.display(), e)))
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        let text = toml::to_string_pretty(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize state: {}", e)))?;
        std::fs::write(&self.path, text).map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        debug!("State saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeStatus;
    use crate::exercise::Exercise;
    use chrono::NaiveDate;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let (_dir, store) = store();
        assert!(store.token().unwrap().is_none());
        assert!(store.challenge().unwrap().is_none());
    }

    #[test]
    fn test_token_round_trip() {
        let (_dir, store) = store();
        store.set_token("abc123").unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (_dir, store) = store();
        store.set_token("tok").unwrap();

        let record = ChallengeRecord {
            date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            status: ChallengeStatus::Pending,
            exercise: Exercise::Araimandi,
        };
        store.set_challenge(&record).unwrap();

        // Writing the challenge key did not disturb the token key
        assert_eq!(store.token().unwrap().as_deref(), Some("tok"));
        let read_back = store.challenge().unwrap().unwrap();
        assert_eq!(read_back.exercise, Exercise::Araimandi);
        assert_eq!(read_back.status, ChallengeStatus::Pending);
    }

    #[test]
    fn test_reopen_sees_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = StateStore::open(dir.path()).unwrap();
            store.set_token("persisted").unwrap();
        }
        let store = StateStore::open(dir.path()).unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("persisted"));
    }
}
