//! End-to-end session behavior against the in-process pose service stub.
//!
//! Intervals are scaled down (50ms ticks, 400ms hold threshold) so a whole
//! coaching arc fits in a second of wall time.

mod common;

use common::{ScriptedReply, TEST_TOKEN};
use posecoach::api::ApiClient;
use posecoach::audio::{AudioSink, NullSink, PlaybackOutcome};
use posecoach::capture::StillDirSource;
use posecoach::challenge::{ChallengeRecord, ChallengeStatus};
use posecoach::coach::{
    Session, SessionConfig, AUTH_MISSING_MESSAGE, CAPTURE_FAILED_MESSAGE, COMPLETION_MESSAGE,
};
use posecoach::events::SessionEvent;
use posecoach::exercise::Exercise;
use posecoach::storage::StateStore;
use posecoach::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(50);
const HOLD: Duration = Duration::from_millis(400);

fn frame_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("frame_000.jpg"), [0xff, 0xd8, 0xff, 0xd9]).unwrap();
    dir
}

fn authed_store() -> (TempDir, StateStore) {
    let dir = TempDir::new().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.set_token(TEST_TOKEN).unwrap();
    (dir, store)
}

fn make_session(
    base_url: &str,
    store: StateStore,
    exercise: Exercise,
    challenge: bool,
    sink: Arc<dyn AudioSink>,
) -> Arc<Session> {
    let api = Arc::new(ApiClient::new(base_url).unwrap());
    Arc::new(Session::new(
        api,
        store,
        sink,
        SessionConfig {
            exercise,
            challenge,
            tick_interval: TICK,
            hold_threshold: HOLD,
        },
    ))
}

fn spawn_run(session: &Arc<Session>, frames: &TempDir) -> JoinHandle<posecoach::Result<()>> {
    let session = Arc::clone(session);
    let source = StillDirSource::open(frames.path()).unwrap();
    tokio::spawn(async move { session.run(Box::new(source)).await })
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream closed")
}

/// Record every event up to and including the first one the predicate accepts.
async fn collect_until(
    events: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Drain whatever is left in the stream after the senders are gone.
async fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        match events.recv().await {
            Ok(event) => seen.push(event),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return seen,
        }
    }
}

#[tokio::test]
async fn test_sustained_hold_completes_challenge_once() {
    let stub = common::start().await;
    stub.set_default(ScriptedReply::new("Hold!"));

    let frames = frame_dir();
    let (_state_dir, store) = authed_store();
    let today = chrono::Local::now().date_naive();
    store
        .set_challenge(&ChallengeRecord {
            date: today,
            exercise: Exercise::Araimandi,
            status: ChallengeStatus::Pending,
        })
        .unwrap();

    let session = make_session(
        &stub.base_url,
        store.clone(),
        Exercise::Araimandi,
        true,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let runner = spawn_run(&session, &frames);

    let mut seen = collect_until(&mut events, |e| {
        matches!(e, SessionEvent::ChallengeCompleted { .. })
    })
    .await;

    // Completion is latched: keep the session running past the threshold
    // again and make sure nothing fires twice.
    tokio::time::sleep(TICK * 6).await;
    session.stop();
    runner.await.unwrap().unwrap();
    drop(session);
    seen.extend(drain(&mut events).await);

    assert!(matches!(
        seen[0],
        SessionEvent::SessionStarted { challenge: true, .. }
    ));
    let completions = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::ChallengeCompleted { .. }))
        .count();
    let banners = seen
        .iter()
        .filter(
            |e| matches!(e, SessionEvent::FeedbackReceived { text, .. } if text == COMPLETION_MESSAGE),
        )
        .count();
    let progress = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::HoldProgress { .. }))
        .count();
    assert_eq!(completions, 1);
    assert_eq!(banners, 1);
    assert!(progress > 0);

    assert!(store.challenge().unwrap().unwrap().is_completed());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.completion_logs(), 1);
}

#[tokio::test]
async fn test_interrupted_hold_never_completes() {
    let stub = common::start().await;
    // Holds accumulate for four ticks, then one correction discards them
    stub.script(vec![ScriptedReply::new("Hold!"); 4]);
    stub.script(vec![ScriptedReply::new("Straighten your back")]);
    stub.set_default(ScriptedReply::silent("Keep steady"));

    let frames = frame_dir();
    let (_state_dir, store) = authed_store();
    let session = make_session(
        &stub.base_url,
        store.clone(),
        Exercise::Mulumandi,
        false,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let runner = spawn_run(&session, &frames);

    // Long enough that an uninterrupted hold would have completed twice over
    tokio::time::sleep(Duration::from_millis(900)).await;
    session.stop();
    runner.await.unwrap().unwrap();
    drop(session);

    let seen = drain(&mut events).await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SessionEvent::ChallengeCompleted { .. })));
    assert_eq!(stub.completion_logs(), 0);
}

#[tokio::test]
async fn test_transport_failure_reports_and_continues() {
    let frames = frame_dir();
    let (_state_dir, store) = authed_store();
    // Nothing is listening on this port
    let session = make_session(
        "http://127.0.0.1:9",
        store,
        Exercise::Squats,
        false,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let runner = spawn_run(&session, &frames);

    // Two error lines in a row prove one failure does not end the loop
    let mut error_lines = 0;
    while error_lines < 2 {
        if matches!(
            next_event(&mut events).await,
            SessionEvent::FeedbackReceived { text, .. } if text.starts_with("Error:")
        ) {
            error_lines += 1;
        }
    }

    session.stop();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_missing_token_keeps_ticking_until_login() {
    let stub = common::start().await;
    stub.set_default(ScriptedReply::silent("Keep going"));

    let frames = frame_dir();
    let state_dir = TempDir::new().unwrap();
    let store = StateStore::open(state_dir.path()).unwrap();

    let session = make_session(
        &stub.base_url,
        store.clone(),
        Exercise::Squats,
        false,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let runner = spawn_run(&session, &frames);

    // Repeated auth prompts, and nothing reaches the service
    let mut prompts = 0;
    while prompts < 2 {
        if matches!(
            next_event(&mut events).await,
            SessionEvent::FeedbackReceived { text, .. } if text == AUTH_MISSING_MESSAGE
        ) {
            prompts += 1;
        }
    }
    assert!(stub.frames_seen().is_empty());

    // A login from another process unblocks the same session
    store.set_token(TEST_TOKEN).unwrap();
    collect_until(&mut events, |e| {
        matches!(e, SessionEvent::FeedbackReceived { text, .. } if text == "Keep going")
    })
    .await;
    assert!(!stub.frames_seen().is_empty());

    session.stop();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_capture_failure_ends_session() {
    let stub = common::start().await;
    let frames = frame_dir();
    let (_state_dir, store) = authed_store();

    let session = make_session(
        &stub.base_url,
        store,
        Exercise::Squats,
        false,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let source = StillDirSource::open(frames.path()).unwrap();

    // The only frame disappears before the first capture
    std::fs::remove_file(frames.path().join("frame_000.jpg")).unwrap();

    let err = session.run(Box::new(source)).await.unwrap_err();
    assert!(matches!(err, Error::Capture(_)));
    drop(session);

    let seen = drain(&mut events).await;
    assert!(seen
        .iter()
        .any(|e| matches!(e, SessionEvent::FeedbackReceived { text, .. } if text == CAPTURE_FAILED_MESSAGE)));
    assert!(matches!(
        seen.last(),
        Some(SessionEvent::SessionStopped { .. })
    ));
}

#[tokio::test]
async fn test_stop_does_not_wait_for_inflight_results() {
    let stub = common::start().await;
    stub.set_default(ScriptedReply::new("Hold!").delayed(Duration::from_millis(400)));

    let frames = frame_dir();
    let (_state_dir, store) = authed_store();
    let session = make_session(
        &stub.base_url,
        store,
        Exercise::Araimandi,
        false,
        Arc::new(NullSink),
    );
    let mut events = session.events();
    let runner = spawn_run(&session, &frames);

    // Stop while the first replies are still in flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.stop();
    let stopping = Instant::now();
    runner.await.unwrap().unwrap();
    assert!(stopping.elapsed() < Duration::from_millis(300));
    drop(session);

    // The delayed replies never surface as feedback
    let seen = drain(&mut events).await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SessionEvent::FeedbackReceived { .. })));
}

/// Sink that records payloads and finishes instantly.
struct RecordingSink {
    begins: Mutex<Vec<Vec<u8>>>,
}

impl AudioSink for RecordingSink {
    fn begin(&self, payload: Vec<u8>) -> oneshot::Receiver<PlaybackOutcome> {
        self.begins.lock().unwrap().push(payload);
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(PlaybackOutcome::Finished);
        rx
    }

    fn cancel(&self) {}
}

#[tokio::test]
async fn test_identical_cue_reaches_speaker_once() {
    let stub = common::start().await;
    // Every reply carries the same audio payload
    stub.set_default(ScriptedReply::new("Hold!"));

    let frames = frame_dir();
    let (_state_dir, store) = authed_store();
    let sink = Arc::new(RecordingSink {
        begins: Mutex::new(Vec::new()),
    });
    let session = make_session(&stub.base_url, store, Exercise::Araimandi, false, sink.clone());
    let runner = spawn_run(&session, &frames);

    tokio::time::sleep(Duration::from_millis(500)).await;
    session.stop();
    runner.await.unwrap().unwrap();

    let begins = sink.begins.lock().unwrap();
    assert_eq!(begins.len(), 1);
    assert_eq!(begins[0], vec![1, 2, 3]);
}
