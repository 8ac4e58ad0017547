//! Error types for camera access and scanner configuration.

use thiserror::Error;

/// Failure to acquire or play a camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("camera access is not supported in this context")]
    Unsupported,

    #[error("video playback failed: {0}")]
    Playback(String),

    #[error("camera error: {0}")]
    Other(String),
}

impl CameraError {
    /// Map a `DOMException.name` from `getUserMedia` to an error kind.
    pub fn from_dom_name(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "SecurityError" => Self::PermissionDenied,
            "NotFoundError" | "OverconstrainedError" => Self::NoDevice,
            "NotReadableError" | "AbortError" => Self::DeviceBusy,
            "TypeError" => Self::Unsupported,
            _ if message.is_empty() => Self::Other(name.to_string()),
            _ => Self::Other(format!("{}: {}", name, message)),
        }
    }

    /// Plain-language text shown in the result region.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Error accessing camera. Please make sure you have granted camera permissions."
            }
            Self::NoDevice => "No camera was found on this device.",
            Self::DeviceBusy => {
                "The camera is being used by another application. Close it and try again."
            }
            Self::Unsupported => {
                "Camera access is not available here. Open the page over HTTPS in a supported browser."
            }
            Self::Playback(_) => "The camera started but the video could not be played.",
            Self::Other(_) => "Error accessing camera.",
        }
    }
}

/// The environment refused to arm the next scan step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to schedule scan step: {0}")]
pub struct ScheduleError(pub String);

/// Invalid scanner configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
