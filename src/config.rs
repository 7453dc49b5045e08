//! Settings resolution for posecoach
//!
//! Settings come from (highest priority first):
//! 1. Command-line arguments
//! 2. Environment variables (handled by clap's `env` attributes)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! The TOML file is optional; a missing file at the default location is not
//! an error. Explicitly requested files must exist.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default pose service base URL (local development server).
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Interval between frame submissions.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1500;

/// Continuous hold duration required to complete a challenge.
pub const DEFAULT_HOLD_THRESHOLD_MS: u64 = 30_000;

/// Default spoken-cue playback volume.
pub const DEFAULT_VOLUME: f32 = 0.8;

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_hold_threshold_ms() -> u64 {
    DEFAULT_HOLD_THRESHOLD_MS
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

/// Settings as read from the TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlSettings {
    /// Pose service base URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Directory holding the client state file (token + challenge record)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Milliseconds between frame submissions
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Milliseconds of continuous hold required for completion
    #[serde(default = "default_hold_threshold_ms")]
    pub hold_threshold_ms: u64,

    /// Audio output configuration (optional)
    #[serde(default)]
    pub audio: AudioSettings,
}

impl Default for TomlSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            state_dir: None,
            tick_interval_ms: default_tick_interval_ms(),
            hold_threshold_ms: default_hold_threshold_ms(),
            audio: AudioSettings::default(),
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    /// Playback volume (0.0 = silent, 1.0 = full), clamped on load
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            device: None,
        }
    }
}

/// Command-line overrides applied on top of the TOML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub state_dir: Option<PathBuf>,
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pose service base URL
    pub server_url: String,

    /// Directory holding the client state file
    pub state_dir: PathBuf,

    /// Milliseconds between frame submissions
    pub tick_interval_ms: u64,

    /// Milliseconds of continuous hold required for completion
    pub hold_threshold_ms: u64,

    /// Spoken-cue playback volume (0.0-1.0)
    pub volume: f32,

    /// Audio output device name (None = default device)
    pub audio_device: Option<String>,
}

impl Settings {
    /// Load settings from the TOML file (if any) and apply CLI overrides.
    ///
    /// # Arguments
    /// - `config_path`: explicit config file path; None uses the default
    ///   location under the platform config directory
    /// - `overrides`: command-line overrides (already env-resolved by clap)
    ///
    /// # Errors
    /// - Explicitly requested config file missing or unreadable
    /// - TOML parse failure
    /// - Invalid values (zero intervals)
    pub async fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let toml_settings = match config_path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
                })?;
                let parsed: TomlSettings = toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
                info!("Loaded configuration from {}", path.display());
                parsed
            }
            None => {
                let default_path = default_config_path();
                match tokio::fs::read_to_string(&default_path).await {
                    Ok(text) => {
                        let parsed: TomlSettings = toml::from_str(&text)
                            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
                        info!("Loaded configuration from {}", default_path.display());
                        parsed
                    }
                    Err(_) => {
                        debug!(
                            "No config file at {}, using built-in defaults",
                            default_path.display()
                        );
                        TomlSettings::default()
                    }
                }
            }
        };

        let server_url = overrides
            .server_url
            .unwrap_or(toml_settings.server_url)
            .trim_end_matches('/')
            .to_string();

        let state_dir = overrides
            .state_dir
            .or(toml_settings.state_dir)
            .unwrap_or_else(default_state_dir);

        if toml_settings.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".to_string()));
        }
        if toml_settings.hold_threshold_ms == 0 {
            return Err(Error::Config("hold_threshold_ms must be positive".to_string()));
        }

        Ok(Settings {
            server_url,
            state_dir,
            tick_interval_ms: toml_settings.tick_interval_ms,
            hold_threshold_ms: toml_settings.hold_threshold_ms,
            volume: toml_settings.audio.volume.clamp(0.0, 1.0),
            audio_device: toml_settings.audio.device,
        })
    }

    /// Frame submission interval as a Duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Hold completion threshold as a Duration.
    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            state_dir: default_state_dir(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            hold_threshold_ms: DEFAULT_HOLD_THRESHOLD_MS,
            volume: DEFAULT_VOLUME,
            audio_device: None,
        }
    }
}

/// Default config file location: `<config_dir>/posecoach/config.toml`
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("posecoach")
        .join("config.toml")
}

/// Default state directory: `<data_dir>/posecoach`
fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("posecoach")
}
