//! Coaching session loop
//!
//! One session drives one exercise: a fixed-interval tick captures a frame
//! and submits it in the background, results come back on a channel and are
//! relayed as events, offered to the cue arbitrator, and fed to the hold
//! timer. Submissions carry the generation current at spawn time, so a
//! result that lands after `stop` is discarded instead of mutating state.

use crate::api::{ApiClient, ApiError, Feedback};
use crate::audio::AudioSink;
use crate::capture::FrameSource;
use crate::challenge;
use crate::coach::arbitrator::CueArbitrator;
use crate::coach::hold::{HoldObservation, HoldTimer};
use crate::error::Result;
use crate::events::SessionEvent;
use crate::exercise::{Exercise, ExerciseKind};
use crate::storage::StateStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Spoken once when the hold threshold is sustained.
pub const COMPLETION_MESSAGE: &str = "Congratulations! Challenge completed.";

/// Shown when a session is started without a stored token.
pub const AUTH_MISSING_MESSAGE: &str = "Authentication token missing. Please log in.";

/// Shown when the frame source stops delivering.
pub const CAPTURE_FAILED_MESSAGE: &str = "Could not access the camera. Please check permissions.";

/// Everything a session needs to know up front.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub exercise: Exercise,
    /// Whether this run counts toward today's challenge record
    pub challenge: bool,
    pub tick_interval: Duration,
    pub hold_threshold: Duration,
}

/// One frame submission's outcome, tagged with its spawn generation.
type FrameResult = (u64, std::result::Result<Feedback, ApiError>);

/// A single coaching run over one exercise.
///
/// `run` owns the loop; `stop` may be called from any task and takes effect
/// at the next await point. Subscribers see the session through its event
/// stream rather than shared state.
pub struct Session {
    api: Arc<ApiClient>,
    store: StateStore,
    arbitrator: CueArbitrator,
    config: SessionConfig,
    session_id: Uuid,
    running: RwLock<bool>,
    stop_requested: AtomicBool,
    /// Bumped by `stop`; in-flight results from older generations are dropped
    generation: AtomicU64,
    stop_notify: Notify,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(
        api: Arc<ApiClient>,
        store: StateStore,
        sink: Arc<dyn AudioSink>,
        config: SessionConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            api,
            store,
            arbitrator: CueArbitrator::new(sink),
            config,
            session_id: Uuid::new_v4(),
            running: RwLock::new(false),
            stop_requested: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            stop_notify: Notify::new(),
            event_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.session_id
    }

    /// Subscribe to the session's event stream.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Request teardown. Safe to call from any task, including before `run`
    /// has begun ticking.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stop_notify.notify_one();
    }

    /// Run the session until `stop` or a fatal capture failure.
    pub async fn run(&self, mut source: Box<dyn FrameSource>) -> Result<()> {
        *self.running.write().await = true;
        info!(
            session_id = %self.session_id,
            exercise = %self.config.exercise,
            challenge = self.config.challenge,
            "Session starting"
        );
        self.emit(SessionEvent::SessionStarted {
            session_id: self.session_id,
            exercise: self.config.exercise,
            challenge: self.config.challenge,
            timestamp: chrono::Utc::now(),
        });

        let result = self.tick_loop(source.as_mut()).await;

        self.arbitrator.reset().await;
        *self.running.write().await = false;
        self.emit(SessionEvent::SessionStopped {
            session_id: self.session_id,
            timestamp: chrono::Utc::now(),
        });
        info!(session_id = %self.session_id, "Session stopped");
        result
    }

    async fn tick_loop(&self, source: &mut dyn FrameSource) -> Result<()> {
        let (result_tx, mut result_rx) = mpsc::channel::<FrameResult>(16);
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut hold = HoldTimer::new(self.config.hold_threshold);

        while !self.stop_requested.load(Ordering::Acquire) {
            tokio::select! {
                _ = self.stop_notify.notified() => break,

                _ = interval.tick() => {
                    // Completed sessions stay alive but the tick is a no-op
                    if hold.is_completed() {
                        continue;
                    }
                    // The token is re-read every tick; a login from another
                    // process unblocks a waiting session
                    let token = match self.store.token() {
                        Ok(Some(token)) => token,
                        Ok(None) => {
                            self.emit_feedback(AUTH_MISSING_MESSAGE.to_string(), false);
                            continue;
                        }
                        Err(e) => {
                            warn!("Failed to read stored token: {}", e);
                            self.emit_feedback(AUTH_MISSING_MESSAGE.to_string(), false);
                            continue;
                        }
                    };
                    let jpeg = match source.capture() {
                        Ok(jpeg) => jpeg,
                        Err(e) => {
                            warn!("Frame capture failed: {}", e);
                            self.emit_feedback(CAPTURE_FAILED_MESSAGE.to_string(), false);
                            return Err(e);
                        }
                    };
                    self.spawn_submission(&token, jpeg, &result_tx);
                }

                Some((generation, result)) = result_rx.recv() => {
                    if generation != self.generation.load(Ordering::Acquire) {
                        debug!("Discarding analysis result from a stopped generation");
                        continue;
                    }
                    match result {
                        Ok(feedback) => self.handle_feedback(feedback, &mut hold).await,
                        Err(e) => {
                            warn!("Frame submission failed: {}", e);
                            self.emit_feedback(format!("Error: {}", e), false);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Submit a frame without blocking the tick cadence.
    fn spawn_submission(&self, token: &str, jpeg: Vec<u8>, result_tx: &mpsc::Sender<FrameResult>) {
        let generation = self.generation.load(Ordering::Acquire);
        let api = Arc::clone(&self.api);
        let token = token.to_string();
        let exercise = self.config.exercise;
        let tx = result_tx.clone();
        tokio::spawn(async move {
            let result = api.submit_frame(&token, exercise, &jpeg).await;
            let _ = tx.send((generation, result)).await;
        });
    }

    async fn handle_feedback(&self, feedback: Feedback, hold: &mut HoldTimer) {
        let is_hold = feedback.is_hold();
        self.emit_feedback(feedback.text.clone(), is_hold);

        match hold.observe(is_hold, Instant::now()) {
            HoldObservation::JustCompleted => self.complete().await,
            HoldObservation::Completed => {
                // Completed sessions keep relaying text but speak no more cues
            }
            HoldObservation::Holding { held_secs } => {
                self.emit(SessionEvent::HoldProgress {
                    session_id: self.session_id,
                    held_secs,
                    timestamp: chrono::Utc::now(),
                });
                let _ = self.arbitrator.offer(&feedback).await;
            }
            HoldObservation::Idle => {
                let _ = self.arbitrator.offer(&feedback).await;
            }
        }
    }

    /// One-shot completion effects for the tick that crossed the threshold.
    async fn complete(&self) {
        let exercise = self.config.exercise;
        info!(session_id = %self.session_id, exercise = %exercise, "Hold threshold sustained");
        self.emit_feedback(COMPLETION_MESSAGE.to_string(), false);
        self.emit(SessionEvent::ChallengeCompleted {
            session_id: self.session_id,
            exercise,
            timestamp: chrono::Utc::now(),
        });

        if self.config.challenge {
            match challenge::mark_completed(&self.store, chrono::Local::now().date_naive(), exercise)
            {
                Ok(true) => debug!("Challenge record marked completed"),
                Ok(false) => debug!("Challenge record unchanged"),
                Err(e) => warn!("Failed to update challenge record: {}", e),
            }
        }

        if exercise.kind() == ExerciseKind::Dance {
            // Fire and forget; the completion already happened locally
            if let Ok(Some(token)) = self.store.token() {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    if let Err(e) = api.log_dance_completion(&token, exercise).await {
                        warn!("Failed to log completion with the service: {}", e);
                    }
                });
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_feedback(&self, text: String, is_hold: bool) {
        self.emit(SessionEvent::FeedbackReceived {
            session_id: self.session_id,
            text,
            is_hold,
            timestamp: chrono::Utc::now(),
        });
    }
}
