use thiserror::Error;

use crate::workflow::StepKind;

/// Fallback text when a call produced no usable detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unknown error occurred.";

/// Text shown when the service could not be reached at all.
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Could not reach the conversion service. Check your connection and try again.";

#[derive(Error, Debug)]
pub enum ReelforgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transfer failed: {message}")]
    Transfer { status: Option<u16>, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("{step} failed: {source}")]
    StepFailed {
        step: StepKind,
        #[source]
        source: Box<ReelforgeError>,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl ReelforgeError {
    /// Text suitable for a single user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::NotImplemented(msg)
            | Self::Download(msg)
            | Self::Config(msg) => msg.clone(),
            Self::Transfer { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Transfer { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            Self::Network(_) | Self::Http(_) => NETWORK_FAILURE_MESSAGE.to_string(),
            Self::StepFailed { source, .. } => source.user_message(),
            Self::FileNotFound(path) => format!("File not found: {}", path),
            other => other.to_string(),
        }
    }

    /// The step a failure is attributed to, when the orchestrator wrapped it.
    pub fn failed_step(&self) -> Option<StepKind> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ReelforgeError>;
