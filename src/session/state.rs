use serde::Serialize;
use std::fmt;

/// Capture cadence of a session.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Countdown, one capture-and-classify cycle, then terminal.
    SingleShot,
    /// Repeated capture-and-classify cycles on a fixed cadence until stopped.
    Continuous,
}

/// Failure category displayed when a session ends in error.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    CredentialMissing,
    CameraUnavailable,
    InferenceError,
}

/// Observable status of the session state machine.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    AcquiringCamera,
    CountingDown { remaining: u32 },
    Capturing,
    AwaitingInference,
    /// Continuous feed running with no count settled yet; shown between
    /// ticks until the first result lands.
    Live,
    /// Latest count in continuous mode; shown between ticks.
    HasResult { count: String },
    /// Terminal single-shot result; held until the next start.
    Complete { count: String },
    Failed { kind: FailureKind },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AcquiringCamera => write!(f, "acquiring camera"),
            Self::CountingDown { remaining } => write!(f, "countdown: {remaining}"),
            Self::Capturing => write!(f, "capturing"),
            Self::AwaitingInference => write!(f, "awaiting inference"),
            Self::Live => write!(f, "live"),
            Self::HasResult { count } => write!(f, "fingers: {count}"),
            Self::Complete { count } => write!(f, "fingers: {count} (done)"),
            Self::Failed { kind } => write!(f, "failed: {kind:?}"),
        }
    }
}

/// The full observable session state, published on every transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Monotonic counter distinguishing this session instance from any prior
    /// one. Bumped on every start and stop; results tagged with an older
    /// generation are discarded on arrival.
    pub generation: u64,
    /// Last successfully displayed count, retained across tolerated
    /// continuous-mode failures.
    pub last_count: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: SessionMode::SingleShot,
            status: SessionStatus::Idle,
            generation: 0,
            last_count: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new session may begin only when no session is running.
    pub fn can_start(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Idle | SessionStatus::Complete { .. } | SessionStatus::Failed { .. }
        )
    }

    /// Begin a new session: clears the prior result/error, bumps the
    /// generation, and moves to camera acquisition.
    pub fn begin(&mut self, mode: SessionMode) {
        self.mode = mode;
        self.generation += 1;
        self.last_count = None;
        self.status = SessionStatus::AcquiringCamera;
    }

    /// Abandon the current generation and return to idle. The generation
    /// bump invalidates every timer and in-flight result created before it.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::Idle;
        self.last_count = None;
    }

    pub fn fail(&mut self, kind: FailureKind) {
        self.status = SessionStatus::Failed { kind };
    }

    /// Record a settled count. Single-shot sessions become terminal;
    /// continuous sessions keep displaying it until the next tick settles.
    pub fn settle_count(&mut self, count: String) {
        self.last_count = Some(count.clone());
        self.status = match self.mode {
            SessionMode::SingleShot => SessionStatus::Complete { count },
            SessionMode::Continuous => SessionStatus::HasResult { count },
        };
    }

    /// A continuous tick settled without a usable count. The prior displayed
    /// result, if any, is retained; with no result yet the feed is simply
    /// live until one lands.
    pub fn keep_displayed(&mut self) {
        self.status = match &self.last_count {
            Some(count) => SessionStatus::HasResult { count: count.clone() },
            None => SessionStatus::Live,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_legal_from_idle_terminal_and_failed() {
        let mut state = SessionState::new();
        assert!(state.can_start());

        state.begin(SessionMode::SingleShot);
        assert!(!state.can_start());

        state.settle_count("2".into());
        assert!(state.can_start());

        state.fail(FailureKind::InferenceError);
        assert!(state.can_start());

        state.status = SessionStatus::AwaitingInference;
        assert!(!state.can_start());
    }

    #[test]
    fn begin_clears_prior_result_and_bumps_generation() {
        let mut state = SessionState::new();
        state.begin(SessionMode::SingleShot);
        state.settle_count("5".into());
        let generation = state.generation;

        state.begin(SessionMode::Continuous);
        assert_eq!(state.generation, generation + 1);
        assert_eq!(state.last_count, None);
        assert_eq!(state.status, SessionStatus::AcquiringCamera);
    }

    #[test]
    fn reset_abandons_the_generation() {
        let mut state = SessionState::new();
        state.begin(SessionMode::Continuous);
        let generation = state.generation;
        state.reset();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.generation > generation);
    }

    #[test]
    fn settle_is_terminal_only_for_single_shot() {
        let mut single = SessionState::new();
        single.begin(SessionMode::SingleShot);
        single.settle_count("3".into());
        assert_eq!(single.status, SessionStatus::Complete { count: "3".into() });

        let mut continuous = SessionState::new();
        continuous.begin(SessionMode::Continuous);
        continuous.settle_count("3".into());
        assert_eq!(continuous.status, SessionStatus::HasResult { count: "3".into() });
    }

    #[test]
    fn keep_displayed_retains_the_last_count() {
        let mut state = SessionState::new();
        state.begin(SessionMode::Continuous);
        state.settle_count("4".into());
        state.status = SessionStatus::AwaitingInference;

        state.keep_displayed();
        assert_eq!(state.status, SessionStatus::HasResult { count: "4".into() });

        state.last_count = None;
        state.keep_displayed();
        assert_eq!(state.status, SessionStatus::Live);
    }
}
