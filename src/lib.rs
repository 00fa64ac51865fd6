//! fingercount: webcam finger counting via a remote vision model.
//!
//! This library provides the core components for:
//! - Camera acquisition and JPEG frame encoding (V4L2, mockable trait)
//! - Remote inference (Gemini generateContent, digit-only parsing)
//! - The session state machine driving both capture modes
//!
//! Rendering is a pure consumer: the controller publishes every state
//! transition on a watch channel and nothing here draws anything.

pub mod camera;
pub mod config;
pub mod error;
pub mod inference;
pub mod session;

pub use camera::{CapturedFrame, PixelFormat, RawFrame, V4l2Source, VideoSource};
pub use config::{CaptureConfig, InferenceConfig};
pub use error::SessionError;
pub use inference::{Classifier, GeminiClient, InferenceOutcome};
pub use session::{FailureKind, SessionController, SessionMode, SessionState, SessionStatus};
