//! Pose coach client - Main entry point
//!
//! Thin CLI over the library: authenticate against the pose service, run
//! coaching sessions, and inspect the daily challenge and progress history.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use posecoach::api::ApiClient;
use posecoach::audio::{AudioSink, DeviceSink, NullSink};
use posecoach::capture::{FrameSource, StillDirSource};
use posecoach::challenge;
use posecoach::coach::{Session, SessionConfig, AUTH_MISSING_MESSAGE};
use posecoach::config::{Overrides, Settings};
use posecoach::events::SessionEvent;
use posecoach::exercise::Exercise;
use posecoach::storage::StateStore;

/// Command-line arguments for posecoach
#[derive(Parser, Debug)]
#[command(name = "posecoach")]
#[command(about = "Real-time pose coaching against a remote analysis service")]
#[command(version)]
struct Cli {
    /// Pose service base URL
    #[arg(long, global = true, env = "POSECOACH_SERVER")]
    server: Option<String>,

    /// Directory holding the client state file
    #[arg(long, global = true, env = "POSECOACH_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "POSECOACH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and store the session token
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Password confirmation; defaults to --password
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Run a coaching session
    Coach {
        /// Exercise to coach (squats, pushups, araimandi, mulumandi, mandi_adavu)
        #[arg(long)]
        exercise: Exercise,

        /// Directory of JPEG frames standing in for the camera
        #[arg(long)]
        frames: PathBuf,

        /// Count this run toward today's challenge
        #[arg(long)]
        challenge: bool,
    },

    /// Show today's challenge, optionally starting it
    Challenge {
        /// Begin a coaching session for the challenge exercise
        #[arg(long, requires = "frames")]
        start: bool,

        /// Directory of JPEG frames standing in for the camera
        #[arg(long)]
        frames: Option<PathBuf>,
    },

    /// Show the per-day completion history
    Progress,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "posecoach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let overrides = Overrides {
        server_url: cli.server.clone(),
        state_dir: cli.state_dir.clone(),
    };
    let settings = Settings::load(cli.config.as_deref(), overrides)
        .await
        .context("Failed to load configuration")?;

    let store = StateStore::open(&settings.state_dir).context("Failed to open state directory")?;
    let api = Arc::new(ApiClient::new(&settings.server_url).context("Invalid server URL")?);

    match cli.command {
        Command::Login { email, password } => cmd_login(&api, &store, &email, &password).await,
        Command::Register {
            email,
            password,
            confirm,
        } => cmd_register(&api, &store, &email, &password, confirm.as_deref()).await,
        Command::Coach {
            exercise,
            frames,
            challenge,
        } => cmd_coach(api, store, &settings, exercise, &frames, challenge).await,
        Command::Challenge { start, frames } => {
            cmd_challenge(api, store, &settings, start, frames.as_deref()).await
        }
        Command::Progress => cmd_progress(&api, &store).await,
    }
}

async fn cmd_login(api: &ApiClient, store: &StateStore, email: &str, password: &str) -> Result<()> {
    let session = api.login(email, password).await.context("Login failed")?;
    store.set_token(&session.token)?;
    match session.user {
        Some(user) => println!("Logged in as {}", user.email),
        None => println!("Logged in"),
    }
    Ok(())
}

async fn cmd_register(
    api: &ApiClient,
    store: &StateStore,
    email: &str,
    password: &str,
    confirm: Option<&str>,
) -> Result<()> {
    let confirm = confirm.unwrap_or(password);
    let session = api
        .register(email, password, confirm)
        .await
        .context("Registration failed")?;
    store.set_token(&session.token)?;
    match session.user {
        Some(user) => println!("Registered {}", user.email),
        None => println!("Registered"),
    }
    Ok(())
}

async fn cmd_coach(
    api: Arc<ApiClient>,
    store: StateStore,
    settings: &Settings,
    exercise: Exercise,
    frames: &Path,
    challenge_run: bool,
) -> Result<()> {
    let source = StillDirSource::open(frames).context("Failed to open frame directory")?;
    run_session(api, store, settings, exercise, challenge_run, Box::new(source)).await
}

async fn cmd_challenge(
    api: Arc<ApiClient>,
    store: StateStore,
    settings: &Settings,
    start: bool,
    frames: Option<&Path>,
) -> Result<()> {
    let record = challenge::get_or_create(&store, chrono::Local::now().date_naive())?;
    if record.is_completed() {
        println!("Today's challenge: {} (completed)", record.exercise.label());
    } else {
        println!("Today's challenge: {}", record.exercise.label());
    }

    if !start {
        return Ok(());
    }
    if record.is_completed() {
        return Ok(());
    }

    let frames = frames.context("--start requires --frames")?;
    let source = StillDirSource::open(frames).context("Failed to open frame directory")?;
    run_session(api, store, settings, record.exercise, true, Box::new(source)).await
}

async fn cmd_progress(api: &ApiClient, store: &StateStore) -> Result<()> {
    let token = store.token()?.context(AUTH_MISSING_MESSAGE)?;
    let points = api.progress(&token).await.context("Failed to fetch progress")?;
    if points.is_empty() {
        println!("No completions recorded yet.");
        return Ok(());
    }
    for point in points {
        println!("{}  {}", point.date, point.count);
    }
    Ok(())
}

/// Drive one session to completion, printing its event stream.
async fn run_session(
    api: Arc<ApiClient>,
    store: StateStore,
    settings: &Settings,
    exercise: Exercise,
    challenge_run: bool,
    source: Box<dyn FrameSource>,
) -> Result<()> {
    let sink = open_sink(settings);
    let session = Arc::new(Session::new(
        api,
        store,
        sink,
        SessionConfig {
            exercise,
            challenge: challenge_run,
            tick_interval: settings.tick_interval(),
            hold_threshold: settings.hold_threshold(),
        },
    ));

    let mut events = session.events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Display fell behind by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let stopper = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            shutdown_signal().await;
            session.stop();
        })
    };

    let result = session.run(source).await;

    stopper.abort();
    let _ = stopper.await;
    // Last sender drops with the session; the printer drains and exits
    drop(session);
    let _ = printer.await;

    result.map_err(Into::into)
}

/// Device sink when the hardware cooperates, otherwise a silent session.
fn open_sink(settings: &Settings) -> Arc<dyn AudioSink> {
    match DeviceSink::new(settings.audio_device.clone(), settings.volume) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!("Audio output unavailable, coaching silently: {}", e);
            Arc::new(NullSink)
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::SessionStarted {
            exercise,
            challenge,
            ..
        } => {
            if *challenge {
                println!("Coaching {} (daily challenge)", exercise.label());
            } else {
                println!("Coaching {}", exercise.label());
            }
            println!("Press Ctrl+C to stop.");
        }
        SessionEvent::FeedbackReceived { text, .. } => println!("  {}", text),
        SessionEvent::HoldProgress { held_secs, .. } => println!("  Holding {}s", held_secs),
        SessionEvent::ChallengeCompleted { exercise, .. } => {
            println!("  {} complete!", exercise.label());
        }
        SessionEvent::SessionStopped { .. } => println!("Session ended."),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping session");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping session");
        }
    }
}
