use std::env;
use std::time::Duration;

/// Capture cadence and encoding settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// V4L2 device index (0 for /dev/video0).
    pub device_index: u32,
    /// Requested frame width; the driver may adjust it.
    pub width: u32,
    /// Requested frame height; the driver may adjust it.
    pub height: u32,
    /// JPEG quality (0-100).
    pub jpeg_quality: u8,
    /// Seconds counted down before a single-shot capture.
    pub countdown_seconds: u32,
    /// Delay between camera acquisition and the first continuous capture.
    pub warmup: Duration,
    /// Continuous-mode delay between the end of one inference call and the
    /// next capture. Chosen to respect the inference service's rate limits.
    pub capture_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            jpeg_quality: 80,
            countdown_seconds: 3,
            warmup: Duration::from_millis(1000),
            capture_interval: Duration::from_millis(1500),
        }
    }
}

/// Remote inference endpoint settings.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// API key, if configured. `None` or a placeholder fails fast with
    /// `CredentialMissing` before any network or camera activity.
    pub api_key: Option<String>,
    /// Model name appended to the endpoint path.
    pub model: String,
    /// Base URL of the generateContent API.
    pub api_base: String,
    /// Network timeout for one inference round trip.
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl InferenceConfig {
    /// Read the credential (and optional model override) from the
    /// environment. The key is read once and cached for the process lifetime.
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && !is_placeholder(key));

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }
}

fn is_placeholder(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    upper.contains("YOUR_API_KEY") || upper.contains("CHANGEME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keys_are_rejected() {
        assert!(is_placeholder("YOUR_API_KEY"));
        assert!(is_placeholder("your_api_key_here"));
        assert!(!is_placeholder("AIzaSyExample123"));
    }

    #[test]
    fn defaults_match_documented_cadence() {
        let config = CaptureConfig::default();
        assert_eq!(config.countdown_seconds, 3);
        assert_eq!(config.capture_interval, Duration::from_millis(1500));
        assert_eq!((config.width, config.height), (640, 480));
    }
}
