//! Directory-backed frame source
//!
//! Cycles through the JPEG files of a directory in name order, one per
//! capture. Stands in for a live camera during demos and drives the
//! integration tests.

use crate::capture::FrameSource;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Frame source that replays JPEG stills from a directory.
pub struct StillDirSource {
    frames: Vec<PathBuf>,
    next: usize,
}

impl StillDirSource {
    /// Scan a directory for `.jpg`/`.jpeg` files.
    ///
    /// # Errors
    /// - Directory unreadable
    /// - No JPEG files present (the source would have nothing to capture)
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Capture(format!("Failed to read frame directory {}: {}", dir.display(), e))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("jpg") | Some("jpeg")
                )
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(Error::Capture(format!(
                "No JPEG frames found in {}",
                dir.display()
            )));
        }

        info!("Frame source ready: {} stills from {}", frames.len(), dir.display());
        Ok(Self { frames, next: 0 })
    }

    /// Number of stills in the cycle.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for StillDirSource {
    fn capture(&mut self) -> Result<Vec<u8>> {
        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();

        let bytes = std::fs::read(path).map_err(|e| {
            Error::Capture(format!("Failed to read frame {}: {}", path.display(), e))
        })?;
        debug!("Captured {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }
}
