//! Cue resampling using rubato
//!
//! Cue payloads arrive at whatever rate the TTS engine used (22.05kHz is
//! typical); the device runs at its own rate. One-shot conversion, since a
//! whole cue is decoded before playback starts.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// One-shot sample rate converter for decoded cues.
pub struct Resampler;

impl Resampler {
    /// Resample interleaved stereo audio from `input_rate` to `output_rate`.
    ///
    /// Returns the input unchanged when the rates already match.
    pub fn convert(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }

        let planar_input = Self::deinterleave(input);
        let input_frames = planar_input[0].len();

        // FastFixedIn with the whole cue as one chunk; speech does not need
        // the sinc resampler's extra quality.
        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            2,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        let output = Self::interleave(&planar_output);
        debug!(
            "Resampled cue: {} frames at {}Hz -> {} frames at {}Hz",
            input_frames,
            input_rate,
            output.len() / 2,
            output_rate
        );
        Ok(output)
    }

    /// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32]) -> Vec<Vec<f32>> {
        let frames = samples.len() / 2;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for pair in samples.chunks_exact(2) {
            left.push(pair[0]);
            right.push(pair[1]);
        }
        vec![left, right]
    }

    /// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
    fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
        let frames = planar[0].len().min(planar[1].len());
        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            interleaved.push(planar[0][i]);
            interleaved.push(planar[1][i]);
        }
        interleaved
    }
}
