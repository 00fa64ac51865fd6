//! The per-session capture/inference loop.
//!
//! One worker task exists per generation; it is replaced wholesale on every
//! start. Every suspension point is raced against the session's cancellation
//! token, and every state write re-checks the generation, so a stop request
//! both halts the loop promptly and suppresses any result that was already
//! in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::camera::{encode_jpeg, CapturedFrame, VideoSource};
use crate::config::CaptureConfig;
use crate::error::SessionError;
use crate::inference::{Classifier, InferenceOutcome};

use super::controller::Shared;
use super::state::{FailureKind, SessionMode, SessionState, SessionStatus};

/// How long a single-shot capture polls for a first decoded frame before
/// giving up on the device.
const FIRST_FRAME_ATTEMPTS: u32 = 15;
const FIRST_FRAME_POLL: Duration = Duration::from_millis(200);

pub(crate) struct WorkerCtx {
    pub(crate) shared: Arc<Shared>,
    pub(crate) camera: Arc<Mutex<Box<dyn VideoSource>>>,
    pub(crate) classifier: Arc<dyn Classifier>,
    pub(crate) config: CaptureConfig,
    pub(crate) mode: SessionMode,
    pub(crate) generation: u64,
    pub(crate) token: CancellationToken,
}

impl WorkerCtx {
    /// Race a future against cancellation. `None` means the session was
    /// stopped; callers unwind without touching state.
    async fn cancellable<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            _ = self.token.cancelled() => None,
            value = fut => Some(value),
        }
    }

    async fn apply(&self, f: impl FnOnce(&mut SessionState)) -> bool {
        self.shared.apply(self.generation, f).await
    }

    async fn set_status(&self, status: SessionStatus) -> bool {
        self.apply(|state| state.status = status).await
    }

    async fn open_camera(&self) -> Option<Result<(), SessionError>> {
        let camera = Arc::clone(&self.camera);
        let mut join = tokio::task::spawn_blocking(move || camera.blocking_lock().open());
        tokio::select! {
            _ = self.token.cancelled() => {
                // A blocking open cannot be interrupted; it must be waited
                // out and whatever it acquired released, or a stop during
                // acquisition would leave the device held while idle.
                let _ = join.await;
                self.release_camera().await;
                None
            }
            joined = &mut join => Some(flatten_join(joined)),
        }
    }

    /// Grab one raw frame and encode it, tagged with this worker's
    /// generation.
    async fn capture(&self) -> Option<Result<CapturedFrame, SessionError>> {
        let camera = Arc::clone(&self.camera);
        let quality = self.config.jpeg_quality;
        let generation = self.generation;
        self.cancellable(tokio::task::spawn_blocking(move || {
            let frame = camera.blocking_lock().grab()?;
            Ok(CapturedFrame {
                jpeg: encode_jpeg(&frame, quality)?,
                generation,
            })
        }))
        .await
        .map(flatten_join)
    }

    async fn classify(&self, frame: CapturedFrame) -> Option<Result<InferenceOutcome, SessionError>> {
        let classifier = Arc::clone(&self.classifier);
        self.cancellable(tokio::task::spawn_blocking(move || {
            classifier.classify(&frame.jpeg)
        }))
        .await
        .map(|joined| {
            joined.unwrap_or_else(|err| Err(SessionError::Inference(format!("worker join: {err}"))))
        })
    }

    async fn release_camera(&self) {
        self.camera.lock().await.close();
    }
}

fn flatten_join<T>(joined: Result<Result<T, SessionError>, tokio::task::JoinError>) -> Result<T, SessionError> {
    joined.unwrap_or_else(|err| Err(SessionError::CameraUnavailable(format!("worker join: {err}"))))
}

pub(crate) async fn run(ctx: WorkerCtx) {
    match ctx.open_camera().await {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            warn!("camera acquisition failed: {err}");
            if let Some(kind) = err.failure_kind() {
                ctx.apply(|state| state.fail(kind)).await;
            }
            return;
        }
        // Stopped while acquiring; open_camera already waited out the open
        // and released the device.
        None => return,
    }

    match ctx.mode {
        SessionMode::SingleShot => single_shot(&ctx).await,
        SessionMode::Continuous => continuous(&ctx).await,
    }

    ctx.release_camera().await;
}

async fn single_shot(ctx: &WorkerCtx) {
    for remaining in (1..=ctx.config.countdown_seconds).rev() {
        if !ctx.set_status(SessionStatus::CountingDown { remaining }).await {
            return;
        }
        if ctx.cancellable(sleep(Duration::from_secs(1))).await.is_none() {
            return;
        }
    }

    if !ctx.set_status(SessionStatus::Capturing).await {
        return;
    }

    // There is no next tick to skip to in single-shot mode, so a source that
    // has not decoded a frame yet is polled briefly before the session fails.
    let mut captured = None;
    for _ in 0..FIRST_FRAME_ATTEMPTS {
        match ctx.capture().await {
            None => return,
            Some(Ok(frame)) => {
                captured = Some(frame);
                break;
            }
            Some(Err(SessionError::NoFrameAvailable)) => {
                if ctx.cancellable(sleep(FIRST_FRAME_POLL)).await.is_none() {
                    return;
                }
            }
            Some(Err(err)) => {
                warn!("capture failed: {err}");
                if let Some(kind) = err.failure_kind() {
                    ctx.apply(|state| state.fail(kind)).await;
                }
                return;
            }
        }
    }
    let Some(frame) = captured else {
        warn!("device produced no decoded frame");
        ctx.apply(|state| state.fail(FailureKind::CameraUnavailable))
            .await;
        return;
    };

    if !ctx.set_status(SessionStatus::AwaitingInference).await {
        return;
    }

    let outcome = match ctx.classify(frame).await {
        None => return,
        Some(outcome) => outcome,
    };

    // Single-shot: the stream stops before the result is shown; the session
    // stays terminal until the next explicit start.
    ctx.release_camera().await;

    match outcome {
        Ok(InferenceOutcome::Count(count)) => {
            ctx.apply(|state| state.settle_count(count)).await;
        }
        Ok(InferenceOutcome::Unrecognized) => {
            warn!("inference reply did not parse as a count");
            ctx.apply(|state| state.fail(FailureKind::InferenceError))
                .await;
        }
        Err(err) => {
            warn!("inference failed: {err}");
            if let Some(kind) = err.failure_kind() {
                ctx.apply(|state| state.fail(kind)).await;
            }
        }
    }
}

async fn continuous(ctx: &WorkerCtx) {
    if ctx.cancellable(sleep(ctx.config.warmup)).await.is_none() {
        return;
    }

    loop {
        if !ctx.set_status(SessionStatus::Capturing).await {
            return;
        }

        let frame = match ctx.capture().await {
            None => return,
            Some(Ok(frame)) => Some(frame),
            Some(Err(SessionError::NoFrameAvailable)) => {
                debug!("no frame decoded yet, skipping tick");
                None
            }
            Some(Err(err)) => {
                // A continuous monitor must not die on one bad grab.
                warn!("capture failed, skipping tick: {err}");
                None
            }
        };

        if let Some(frame) = frame {
            if !ctx.set_status(SessionStatus::AwaitingInference).await {
                return;
            }
            match ctx.classify(frame).await {
                None => return,
                Some(Ok(InferenceOutcome::Count(count))) => {
                    ctx.apply(|state| state.settle_count(count)).await;
                }
                Some(Ok(InferenceOutcome::Unrecognized)) => {
                    debug!("unrecognized reply, keeping previous result");
                    ctx.apply(|state| state.keep_displayed()).await;
                }
                Some(Err(err)) => {
                    // Transient-failure tolerance: keep the prior displayed
                    // result and stay on cadence.
                    warn!("inference failed, keeping previous result: {err}");
                    ctx.apply(|state| state.keep_displayed()).await;
                }
            }
        }

        // Interval measured from settlement of this tick, not wall clock, so
        // a slow inference call can never overlap the next request.
        if ctx
            .cancellable(sleep(ctx.config.capture_interval))
            .await
            .is_none()
        {
            return;
        }
    }
}
