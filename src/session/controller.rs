use std::sync::Arc;

use log::info;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::camera::VideoSource;
use crate::config::CaptureConfig;
use crate::error::SessionError;
use crate::inference::Classifier;

use super::state::{SessionMode, SessionState, SessionStatus};
use super::worker::{self, WorkerCtx};

/// Session state plus its broadcast channel. Every mutation goes through
/// `apply`, which drops writes tagged with a stale generation. That one
/// check replaces per-callback "is this still active" flags.
pub(crate) struct Shared {
    pub(crate) state: Mutex<SessionState>,
    tx: watch::Sender<SessionState>,
}

impl Shared {
    fn new() -> Self {
        let initial = SessionState::new();
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    pub(crate) fn publish(&self, state: &SessionState) {
        // send_replace keeps the stored value fresh for late subscribers.
        let _ = self.tx.send_replace(state.clone());
    }

    /// Mutate and publish the state, unless `generation` is no longer
    /// current. Returns whether the write was applied.
    pub(crate) async fn apply<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        let mut guard = self.state.lock().await;
        if guard.generation != generation {
            return false;
        }
        f(&mut guard);
        self.publish(&guard);
        true
    }
}

struct Worker {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

/// Owns the camera lifecycle and the capture/inference loop of one session
/// at a time. Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
    camera: Arc<Mutex<Box<dyn VideoSource>>>,
    classifier: Arc<dyn Classifier>,
    config: CaptureConfig,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl SessionController {
    pub fn new(
        camera: Box<dyn VideoSource>,
        classifier: Arc<dyn Classifier>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            camera: Arc::new(Mutex::new(camera)),
            classifier,
            config,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.shared.state.lock().await.clone()
    }

    /// Watch the session state. The receiver always holds the latest state;
    /// rendering is a pure consumer of this channel.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.tx.subscribe()
    }

    /// Begin a session. Legal only from idle or a terminal state. The
    /// credential is checked before any camera access so a misconfigured
    /// client never triggers a device permission request.
    pub async fn start(&self, mode: SessionMode) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.shared.state.lock().await;
            if !state.can_start() {
                return Err(SessionError::AlreadyActive);
            }

            if let Err(err) = self.classifier.ensure_configured() {
                if let Some(kind) = err.failure_kind() {
                    state.fail(kind);
                    self.shared.publish(&state);
                }
                return Err(err);
            }

            state.begin(mode);
            self.shared.publish(&state);
            state.generation
        };

        info!("session {generation} starting ({mode:?})");

        let token = CancellationToken::new();
        let ctx = WorkerCtx {
            shared: Arc::clone(&self.shared),
            camera: Arc::clone(&self.camera),
            classifier: Arc::clone(&self.classifier),
            config: self.config.clone(),
            mode,
            generation,
            token: token.clone(),
        };
        // Join any leftover worker from a naturally finished session before
        // the new one is spawned. Its exit path may still be closing the
        // camera, and that close must not land on the new session's device.
        let mut guard = self.worker.lock().await;
        if let Some(old) = guard.take() {
            old.token.cancel();
            let _ = old.handle.await;
        }
        *guard = Some(Worker {
            handle: tokio::spawn(worker::run(ctx)),
            token,
        });
        Ok(())
    }

    /// Stop the session from any state: abandon the current generation,
    /// cancel and join the worker, release the camera. Idempotent and
    /// leak-free regardless of which state it interrupts.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let worker = self.worker.lock().await.take();

        {
            let mut state = self.shared.state.lock().await;
            if state.status != SessionStatus::Idle {
                info!("session {} stopping", state.generation);
                state.reset();
                self.shared.publish(&state);
            }
        }

        if let Some(worker) = worker {
            worker.token.cancel();
            let _ = worker.handle.await;
        }

        // The worker closes the camera on its own exit paths; this covers a
        // worker interrupted between acquisition and cleanup.
        self.camera.lock().await.close();
        Ok(())
    }
}
