//! Audio pipeline for spoken cues
//!
//! Cue payloads arrive as encoded audio from the pose service and flow
//! decode -> resample -> ring buffer -> cpal callback. Playback is wrapped
//! behind the [`AudioSink`] trait so the coaching loop runs unchanged with
//! no audio device.

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod sink;
pub mod types;

pub use decoder::CueDecoder;
pub use output::AudioOutput;
pub use resampler::Resampler;
pub use sink::{AudioSink, DeviceSink, NullSink, PlaybackOutcome};
pub use types::{AudioFrame, CueBuffer};
