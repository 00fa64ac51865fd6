pub mod controller;
pub mod state;
mod worker;

pub use controller::SessionController;
pub use state::{FailureKind, SessionMode, SessionState, SessionStatus};
