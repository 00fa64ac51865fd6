//! CLI front end: starts a session, renders state transitions as log lines.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use fingercount::{
    CaptureConfig, GeminiClient, InferenceConfig, SessionController, SessionMode, SessionStatus,
    V4l2Source,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Countdown, one capture, one result.
    Single,
    /// Repeated captures until Ctrl-C.
    Continuous,
}

#[derive(Parser, Debug)]
#[command(name = "fingercount", about = "Count fingers on a webcam feed")]
struct Args {
    /// Capture mode.
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// V4L2 device index (0 for /dev/video0).
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Continuous-mode interval in milliseconds, measured from the end of
    /// one inference call.
    #[arg(long, default_value_t = 1500)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let capture = CaptureConfig {
        device_index: args.device,
        capture_interval: std::time::Duration::from_millis(args.interval_ms),
        ..CaptureConfig::default()
    };
    let camera = Box::new(V4l2Source::new(&capture));
    let classifier = Arc::new(GeminiClient::new(InferenceConfig::from_env()));

    let controller = SessionController::new(camera, classifier, capture);
    let mut states = controller.subscribe();

    let mode = match args.mode {
        Mode::Single => SessionMode::SingleShot,
        Mode::Continuous => SessionMode::Continuous,
    };
    controller.start(mode).await?;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                info!("{}", state.status);
                if matches!(
                    state.status,
                    SessionStatus::Complete { .. } | SessionStatus::Failed { .. }
                ) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                controller.stop().await?;
                break;
            }
        }
    }

    // Releases the camera on every exit path, including a finished
    // single-shot session.
    controller.stop().await?;
    Ok(())
}
