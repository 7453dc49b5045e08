//! Spoken-cue arbitration
//!
//! Every analysis result offers its cue here; the arbitrator decides which
//! ones actually reach the speaker. Exactly one cue plays at a time, spoken
//! cues are spaced by a minimum gap, and a cue identical to the previous
//! spoken one is suppressed so the coach does not nag.

use crate::api::Feedback;
use crate::audio::AudioSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Minimum spacing between the starts of two spoken cues.
pub const MIN_CUE_GAP: Duration = Duration::from_millis(2000);

/// Number of payload bytes hashed for duplicate detection.
const HASH_PREFIX_LEN: usize = 64;

/// Why an offered cue was or was not spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// Accepted; playback started
    Spoken,
    /// The service did not ask for speech, or sent no audio
    Muted,
    /// A cue is still playing
    Busy,
    /// Identical to the previous spoken cue
    Repeat,
    /// Inside the minimum gap since the previous spoken cue
    TooSoon,
}

struct ArbState {
    last_hash: Option<String>,
    last_played_at: Option<Instant>,
}

/// Gatekeeper between analysis results and the audio sink.
///
/// Decisions are serialized under one lock so concurrent offers cannot both
/// pass the busy check. The active cue is tracked by sequence number: the
/// watcher task that observes playback end only clears the flag if its own
/// cue is still the active one, so a stale watcher cannot release a newer
/// cue's slot.
pub struct CueArbitrator {
    sink: Arc<dyn AudioSink>,
    state: Mutex<ArbState>,
    /// Sequence number of the active cue, 0 when idle
    playing: Arc<AtomicU64>,
    next_seq: AtomicU64,
}

impl CueArbitrator {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(ArbState {
                last_hash: None,
                last_played_at: None,
            }),
            playing: Arc::new(AtomicU64::new(0)),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Offer a cue for speaking.
    pub async fn offer(&self, feedback: &Feedback) -> OfferDecision {
        self.offer_at(feedback, Instant::now()).await
    }

    /// Offer a cue, with the decision clock passed in for tests.
    ///
    /// Rejections leave the duplicate and rate-limit state untouched; only
    /// a spoken cue becomes the new reference point.
    pub async fn offer_at(&self, feedback: &Feedback, now: Instant) -> OfferDecision {
        if !feedback.should_speak || feedback.audio.is_empty() {
            return OfferDecision::Muted;
        }

        let mut state = self.state.lock().await;

        if self.playing.load(Ordering::Acquire) != 0 {
            debug!("Cue rejected: playback in progress");
            return OfferDecision::Busy;
        }

        let hash = content_hash(&feedback.audio);
        if state.last_hash.as_deref() == Some(hash.as_str()) {
            debug!("Cue rejected: duplicate of previous cue");
            return OfferDecision::Repeat;
        }

        if let Some(at) = state.last_played_at {
            let since = now.duration_since(at);
            if since < MIN_CUE_GAP {
                debug!("Cue rejected: {}ms since previous cue", since.as_millis());
                return OfferDecision::TooSoon;
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.playing.store(seq, Ordering::Release);
        state.last_hash = Some(hash);
        state.last_played_at = Some(now);

        let done = self.sink.begin(feedback.audio.clone());
        let playing = Arc::clone(&self.playing);
        tokio::spawn(async move {
            let outcome = done.await;
            debug!("Cue {} ended: {:?}", seq, outcome);
            // Only release the slot if this cue is still the active one
            let _ = playing.compare_exchange(seq, 0, Ordering::AcqRel, Ordering::Acquire);
        });

        debug!("Cue {} speaking ({} bytes)", seq, feedback.audio.len());
        OfferDecision::Spoken
    }

    /// Cut off any active cue and forget the pacing state.
    ///
    /// Used at session teardown; the next session starts with a clean
    /// rate-limit and duplicate window.
    pub async fn reset(&self) {
        self.sink.cancel();
        self.playing.store(0, Ordering::Release);
        let mut state = self.state.lock().await;
        state.last_hash = None;
        state.last_played_at = None;
    }
}

/// Cheap content identity: hex of the payload's first bytes.
///
/// Cue audio is machine-generated, so matching prefixes mean matching
/// phrases; hashing the whole payload would buy nothing.
fn content_hash(payload: &[u8]) -> String {
    use std::fmt::Write as _;
    let prefix = &payload[..payload.len().min(HASH_PREFIX_LEN)];
    let mut hash = String::with_capacity(prefix.len() * 2);
    for byte in prefix {
        let _ = write!(hash, "{:02x}", byte);
    }
    hash
}
