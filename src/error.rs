use thiserror::Error;

use crate::session::FailureKind;

/// Errors surfaced by the capture/inference session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The inference client has no usable API key. Checked before the camera
    /// is requested so the user is never asked for a device needlessly.
    #[error("inference credential is not configured")]
    CredentialMissing,

    /// The video device could not be opened or streamed.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// The source has not decoded a frame yet. Tick-local; callers skip the
    /// tick and try again.
    #[error("no decoded frame available")]
    NoFrameAvailable,

    /// The remote inference call failed (network, service, or timeout).
    #[error("inference request failed: {0}")]
    Inference(String),

    /// A session is already running; stop it before starting another.
    #[error("session already active")]
    AlreadyActive,
}

impl SessionError {
    /// The displayable failure category for errors that end a session.
    /// Transient errors (`NoFrameAvailable`) have no category.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::CredentialMissing => Some(FailureKind::CredentialMissing),
            Self::CameraUnavailable(_) => Some(FailureKind::CameraUnavailable),
            Self::Inference(_) => Some(FailureKind::InferenceError),
            Self::NoFrameAvailable | Self::AlreadyActive => None,
        }
    }
}
