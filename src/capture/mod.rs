//! Frame capture sources
//!
//! The session acquires one `FrameSource` at start and drops it on teardown.
//! The shipped implementation cycles JPEG stills from a directory; a
//! device-backed camera source plugs in at the same seam.

pub mod still_dir;

pub use still_dir::StillDirSource;

use crate::error::Result;

/// Producer of still frames for submission.
///
/// `capture` is called once per tick on the session task; implementations
/// return one encoded JPEG per call. Errors are fatal to the session (there
/// is no retry once the source goes away).
pub trait FrameSource: Send {
    /// Capture one still frame as encoded JPEG bytes.
    fn capture(&mut self) -> Result<Vec<u8>>;
}
