//! Playback seam for spoken cues
//!
//! `AudioSink` is the single entry point to the audio device; the arbitrator
//! owns the only handle, which is what guarantees at-most-one active cue.
//! `DeviceSink` hosts the cpal stream on a dedicated thread (`cpal::Stream`
//! is not `Send`), feeding it through a lock-free ring buffer. `NullSink`
//! swallows cues for headless runs and tests.

use crate::audio::decoder::CueDecoder;
use crate::audio::output::AudioOutput;
use crate::audio::resampler::Resampler;
use crate::audio::types::{AudioFrame, CueBuffer};
use crate::error::{Error, Result};
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// How one cue playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The cue played to its end
    Finished,
    /// Decode, resample, or device failure; the cue is dropped
    Failed,
    /// Preempted by cancel or shutdown
    Cancelled,
}

/// Playback seam owned by the arbitrator.
///
/// `begin` hands over a raw cue payload and resolves the returned receiver
/// when playback ends, however it ends. Implementations never queue: the
/// arbitrator rejects offers while a cue is active, and a second `begin`
/// preempts the first.
pub trait AudioSink: Send + Sync {
    /// Start playing a cue payload (encoded audio, typically MP3).
    fn begin(&self, payload: Vec<u8>) -> oneshot::Receiver<PlaybackOutcome>;

    /// Stop the active cue, if any. Idle cancel is a no-op.
    fn cancel(&self);
}

/// Sink that discards cues immediately.
///
/// Used when no audio device is available and in tests; the arbitrator's
/// rate limit still spaces accepted cues.
pub struct NullSink;

impl AudioSink for NullSink {
    fn begin(&self, _payload: Vec<u8>) -> oneshot::Receiver<PlaybackOutcome> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(PlaybackOutcome::Finished);
        rx
    }

    fn cancel(&self) {}
}

enum SinkCommand {
    Play {
        payload: Vec<u8>,
        done: oneshot::Sender<PlaybackOutcome>,
    },
    Cancel,
    Shutdown,
}

/// Device-backed sink.
///
/// A dedicated thread owns the `AudioOutput` for the process lifetime and
/// builds one short-lived stream per cue: decode, resample to the device
/// rate, preload a ring buffer, then poll until the callback drains it.
pub struct DeviceSink {
    cmd_tx: mpsc::UnboundedSender<SinkCommand>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl DeviceSink {
    /// Open the audio device on its own thread.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `volume`: Playback volume, clamped to 0.0-1.0
    ///
    /// # Errors
    /// Device enumeration or open failure. Callers typically fall back to
    /// `NullSink` so coaching continues silently.
    pub fn new(device_name: Option<String>, volume: f32) -> Result<Self> {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<SinkCommand>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<std::result::Result<u32, String>>();
        let volume = Arc::new(Mutex::new(volume.clamp(0.0, 1.0)));

        let thread = std::thread::spawn(move || {
            // The device must be opened on this thread; cpal streams are
            // neither Send nor Sync.
            let mut output = match AudioOutput::new(device_name, volume) {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(output.sample_rate()));
                    output
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            let mut pending: Option<SinkCommand> = None;
            loop {
                let cmd = match pending.take() {
                    Some(cmd) => cmd,
                    None => match cmd_rx.blocking_recv() {
                        Some(cmd) => cmd,
                        None => break,
                    },
                };

                match cmd {
                    SinkCommand::Cancel => continue,
                    SinkCommand::Shutdown => break,
                    SinkCommand::Play { payload, done } => {
                        let (outcome, next) = play_cue(&mut output, &payload, &mut cmd_rx);
                        let _ = done.send(outcome);
                        match next {
                            Some(SinkCommand::Shutdown) => break,
                            other => pending = other,
                        }
                    }
                }
            }

            debug!("Audio sink thread exiting");
        });

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(sample_rate)) => {
                info!("Audio sink ready at {}Hz", sample_rate);
                Ok(Self {
                    cmd_tx,
                    thread: Some(thread),
                })
            }
            Ok(Err(msg)) => Err(Error::AudioOutput(msg)),
            Err(_) => Err(Error::AudioOutput(
                "Audio thread did not report readiness".to_string(),
            )),
        }
    }
}

impl AudioSink for DeviceSink {
    fn begin(&self, payload: Vec<u8>) -> oneshot::Receiver<PlaybackOutcome> {
        let (done_tx, done_rx) = oneshot::channel();
        let cmd = SinkCommand::Play {
            payload,
            done: done_tx,
        };
        if let Err(mpsc::error::SendError(cmd)) = self.cmd_tx.send(cmd) {
            // Sink thread is gone; resolve the cue as failed so the
            // arbitrator frees itself.
            if let SinkCommand::Play { done, .. } = cmd {
                let _ = done.send(PlaybackOutcome::Failed);
            }
        }
        done_rx
    }

    fn cancel(&self) {
        let _ = self.cmd_tx.send(SinkCommand::Cancel);
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(SinkCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Play one cue to the end, an error, or a preempting command.
///
/// Returns the outcome plus any command that interrupted playback and still
/// needs handling.
fn play_cue(
    output: &mut AudioOutput,
    payload: &[u8],
    cmd_rx: &mut mpsc::UnboundedReceiver<SinkCommand>,
) -> (PlaybackOutcome, Option<SinkCommand>) {
    let cue = match prepare_cue(payload, output.sample_rate()) {
        Ok(cue) => cue,
        Err(e) => {
            warn!("Dropping unplayable cue: {}", e);
            return (PlaybackOutcome::Failed, None);
        }
    };
    if cue.frame_count() == 0 {
        return (PlaybackOutcome::Finished, None);
    }

    // Preload the whole cue; the callback only ever pops.
    let rb = HeapRb::<AudioFrame>::new(cue.frame_count());
    let (mut producer, mut consumer) = rb.split();
    for pair in cue.samples.chunks_exact(2) {
        let frame = AudioFrame {
            left: pair[0],
            right: pair[1],
        };
        if producer.try_push(frame).is_err() {
            break;
        }
    }
    drop(producer);

    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = Arc::clone(&finished);
    let callback = move || match consumer.try_pop() {
        Some(frame) => frame,
        None => {
            finished_flag.store(true, Ordering::Release);
            AudioFrame::zero()
        }
    };

    output.clear_error();
    if let Err(e) = output.start(callback) {
        error!("Failed to start cue stream: {}", e);
        return (PlaybackOutcome::Failed, None);
    }
    debug!("Cue playing: {}ms", cue.duration_ms());

    let mut outcome = PlaybackOutcome::Finished;
    let mut next = None;
    loop {
        if finished.load(Ordering::Acquire) {
            break;
        }
        if output.has_error() {
            outcome = PlaybackOutcome::Failed;
            break;
        }
        match cmd_rx.try_recv() {
            Ok(SinkCommand::Cancel) => {
                outcome = PlaybackOutcome::Cancelled;
                break;
            }
            Ok(SinkCommand::Shutdown) => {
                outcome = PlaybackOutcome::Cancelled;
                next = Some(SinkCommand::Shutdown);
                break;
            }
            Ok(play) => {
                outcome = PlaybackOutcome::Cancelled;
                next = Some(play);
                break;
            }
            Err(mpsc::error::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                outcome = PlaybackOutcome::Cancelled;
                next = Some(SinkCommand::Shutdown);
                break;
            }
        }
    }

    if let Err(e) = output.stop() {
        warn!("Failed to stop cue stream: {}", e);
    }
    (outcome, next)
}

/// Decode and resample a payload for the device.
fn prepare_cue(payload: &[u8], device_rate: u32) -> Result<CueBuffer> {
    let decoded = CueDecoder::decode(payload)?;
    if decoded.sample_rate == device_rate {
        return Ok(decoded);
    }
    let samples = Resampler::convert(&decoded.samples, decoded.sample_rate, device_rate)?;
    Ok(CueBuffer::new(samples, device_rate))
}
