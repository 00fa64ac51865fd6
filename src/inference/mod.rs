//! Remote finger-count classification.
//!
//! The session loop hands an encoded frame to a `Classifier` and interprets
//! the free-form text reply. Parsing is total: a reply either is a pure digit
//! string (the count) or it is `Unrecognized`, never an error and never a
//! guessed zero.

pub mod client;

use serde::Serialize;

use crate::error::SessionError;

pub use client::GeminiClient;

/// Outcome of one successful inference round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum InferenceOutcome {
    /// The reply was a pure digit string. Kept as the literal string;
    /// multi-digit replies are not rejected by the digit-only check.
    Count(String),
    /// The reply did not parse as a digit string (prose, empty, multi-token).
    Unrecognized,
}

/// Finger-count classification service. Implementations block; the session
/// loop calls them through `spawn_blocking`.
pub trait Classifier: Send + Sync {
    /// Fail fast with `CredentialMissing` when the client cannot make
    /// requests. Checked before the camera is acquired.
    fn ensure_configured(&self) -> Result<(), SessionError>;

    /// One network round trip: image in, parsed outcome out. No local retry;
    /// retry policy lives in the session loop.
    fn classify(&self, jpeg: &[u8]) -> Result<InferenceOutcome, SessionError>;
}

/// Interpret a raw model reply per the digit-only contract.
pub fn parse_count(reply: &str) -> InferenceOutcome {
    let trimmed = reply.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        InferenceOutcome::Count(trimmed.to_string())
    } else {
        InferenceOutcome::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_digits_parse_as_counts() {
        assert_eq!(parse_count("3"), InferenceOutcome::Count("3".into()));
        assert_eq!(parse_count("0"), InferenceOutcome::Count("0".into()));
        assert_eq!(parse_count(" 4\n"), InferenceOutcome::Count("4".into()));
    }

    #[test]
    fn multi_digit_replies_are_kept_literally() {
        assert_eq!(parse_count("12"), InferenceOutcome::Count("12".into()));
    }

    #[test]
    fn prose_and_empty_replies_are_unrecognized() {
        assert_eq!(parse_count("no hand detected"), InferenceOutcome::Unrecognized);
        assert_eq!(parse_count(""), InferenceOutcome::Unrecognized);
        assert_eq!(parse_count("  "), InferenceOutcome::Unrecognized);
        assert_eq!(parse_count("2 fingers"), InferenceOutcome::Unrecognized);
        assert_eq!(parse_count("-1"), InferenceOutcome::Unrecognized);
    }
}
