//! Spoken-cue decoding using symphonia
//!
//! The service returns cue audio as an in-memory MP3 payload; this decodes
//! it to interleaved stereo f32 at the source rate. WAV also probes cleanly,
//! which is what the test fixtures use.

use crate::audio::types::CueBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoder for in-memory cue payloads.
pub struct CueDecoder;

impl CueDecoder {
    /// Decode a cue payload to interleaved stereo f32 samples.
    ///
    /// Mono sources are widened to stereo; the sample rate is left at
    /// whatever the payload was encoded with.
    ///
    /// # Errors
    /// - Payload is not a recognizable audio container
    /// - No decodable audio track
    pub fn decode(payload: &[u8]) -> Result<CueBuffer> {
        if payload.is_empty() {
            return Err(Error::Decode("Empty cue payload".to_string()));
        }

        let cursor = Cursor::new(payload.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        // TTS payloads are MP3; the hint is advisory and the probe still
        // sniffs other containers (WAV fixtures in tests).
        let mut hint = Hint::new();
        hint.mime_type("audio/mpeg");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe cue payload: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track in cue payload".to_string()))?;

        let track_id = track.id;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading cue packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    // Lazily size the conversion buffer from the first
                    // decoded packet; copy_interleaved_ref converts any
                    // source sample format to f32.
                    if sample_buf.is_none() {
                        let spec = *decoded.spec();
                        sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(e) => {
                    warn!("Cue decode error: {}", e);
                    continue;
                }
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode("Cue payload decoded to no samples".to_string()));
        }

        let stereo = match channels {
            1 => Self::widen_mono(samples),
            2 => samples,
            n => Self::downmix_to_stereo(samples, n),
        };

        debug!(
            "Decoded cue: {} frames at {}Hz ({} source channels)",
            stereo.len() / 2,
            sample_rate,
            channels
        );

        Ok(CueBuffer::new(stereo, sample_rate))
    }

    /// Duplicate a mono stream into both channels.
    fn widen_mono(samples: Vec<f32>) -> Vec<f32> {
        let mut stereo = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            stereo.push(sample);
            stereo.push(sample);
        }
        stereo
    }

    /// Fold a multichannel stream down to stereo (first two channels kept).
    fn downmix_to_stereo(samples: Vec<f32>, channels: usize) -> Vec<f32> {
        let frames = samples.len() / channels;
        let mut stereo = Vec::with_capacity(frames * 2);
        for frame in samples.chunks_exact(channels) {
            stereo.push(frame[0]);
            stereo.push(frame[1]);
        }
        stereo
    }
}
