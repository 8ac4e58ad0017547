//! Scanner configuration, passed from JavaScript as JSON.
//!
//! Every field has a default, so `{}` (or an empty string) gives a scanner
//! wired to the `video`, `startButton`, `stopButton` and `result` elements,
//! preferring the rear camera, with a one second cooldown after each hit.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::FacingMode;
use crate::decode::Strategy;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub facing_mode: FacingMode,
    /// Pause after a successful decode before scanning resumes.
    pub cooldown_ms: u32,
    pub elements: ElementIds,
    pub messages: Messages,
    /// Preprocessing cascade tried on each frame, in order.
    pub strategies: Vec<Strategy>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            cooldown_ms: 1000,
            elements: ElementIds::default(),
            messages: Messages::default(),
            strategies: Strategy::default_cascade(),
        }
    }
}

/// DOM element ids the browser surface binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementIds {
    pub video: String,
    pub start_button: String,
    pub stop_button: String,
    pub result: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            video: "video".to_string(),
            start_button: "startButton".to_string(),
            stop_button: "stopButton".to_string(),
            result: "result".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Prepended to the decoded payload.
    pub found_prefix: String,
    pub stopped: String,
    /// Shown when the scan loop cannot be re-armed and the camera is shut down.
    pub scan_failed: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            found_prefix: "QR Code detected: ".to_string(),
            stopped: "Camera stopped".to_string(),
            scan_failed: "Scanning stopped unexpectedly. Press start to try again.".to_string(),
        }
    }
}

impl Messages {
    pub fn found(&self, payload: &str) -> String {
        format!("{}{}", self.found_prefix, payload)
    }
}

impl ScannerConfig {
    /// Parse and validate. Blank input yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = if json.trim().is_empty() {
            Self::default()
        } else {
            serde_json::from_str(json)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ids = [
            ("video", &self.elements.video),
            ("start_button", &self.elements.start_button),
            ("stop_button", &self.elements.stop_button),
            ("result", &self.elements.result),
        ];
        if let Some((name, _)) = ids.iter().find(|(_, id)| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("element id `{}` is empty", name)));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("at least one decode strategy is required".into()));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(u64::from(self.cooldown_ms))
    }
}
