//! Gemini generateContent client.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::config::InferenceConfig;
use crate::error::SessionError;

use super::{parse_count, Classifier, InferenceOutcome};

/// Instruction sent with every frame. The digit-only contract keeps parsing
/// trivial on this side.
const INSTRUCTION: &str = "How many fingers is the person holding up? \
    Respond with a single digit only. Respond with 0 if no hand is visible.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
}

/// Blocking HTTP client for the generateContent API. The credential is read
/// once at construction and cached for the process lifetime.
pub struct GeminiClient {
    agent: ureq::Agent,
    config: InferenceConfig,
}

impl GeminiClient {
    pub fn new(config: InferenceConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { agent, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl Classifier for GeminiClient {
    fn ensure_configured(&self) -> Result<(), SessionError> {
        match self.config.api_key {
            Some(_) => Ok(()),
            None => Err(SessionError::CredentialMissing),
        }
    }

    fn classify(&self, jpeg: &[u8]) -> Result<InferenceOutcome, SessionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(SessionError::CredentialMissing)?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": INSTRUCTION },
                    { "inlineData": {
                        "mimeType": "image/jpeg",
                        "data": BASE64.encode(jpeg),
                    }},
                ],
            }],
        });

        let response = self
            .agent
            .post(&self.endpoint())
            .set("x-goog-api-key", api_key)
            .send_json(body)
            .map_err(|err| SessionError::Inference(err.to_string()))?;

        let parsed: GenerateResponse = response
            .into_json()
            .map_err(|err| SessionError::Inference(format!("malformed response: {err}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        debug!("model reply: {text:?}");
        Ok(parse_count(&text))
    }
}
