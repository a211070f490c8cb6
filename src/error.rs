use std::fmt;
use thiserror::Error;

/// Why a streamed completion could not be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFailureKind {
    QuotaExceeded,
    ModelUnavailable,
    ServiceUnavailable,
    Network,
    Remote,
}

impl StreamFailureKind {
    /// Maps an HTTP status (and the response body, when there is one) to a failure kind.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            402 | 429 => StreamFailureKind::QuotaExceeded,
            404 => StreamFailureKind::ModelUnavailable,
            400 if body.to_lowercase().contains("model") => StreamFailureKind::ModelUnavailable,
            500..=599 => StreamFailureKind::ServiceUnavailable,
            _ => StreamFailureKind::Remote,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StreamFailureKind::QuotaExceeded => "System busy (429 error) or quota reached.",
            StreamFailureKind::ModelUnavailable => "The selected model is unavailable.",
            StreamFailureKind::ServiceUnavailable => "The model provider is temporarily unavailable.",
            StreamFailureKind::Network => "Could not reach the model provider.",
            StreamFailureKind::Remote => "The model provider returned an error.",
        }
    }

    pub fn remedy(&self) -> &'static str {
        match self {
            StreamFailureKind::QuotaExceeded =>
                "Your API key's daily limit might be reached. Try a new key or switch model.",
            StreamFailureKind::ModelUnavailable => "Switch to another vision model and retry.",
            StreamFailureKind::ServiceUnavailable => "Wait a moment and retry, or switch model.",
            StreamFailureKind::Network => "Check the network connection and retry.",
            StreamFailureKind::Remote => "Retry the message or switch model.",
        }
    }
}

impl fmt::Display for StreamFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamFailureKind::QuotaExceeded => "quota_exceeded",
            StreamFailureKind::ModelUnavailable => "model_unavailable",
            StreamFailureKind::ServiceUnavailable => "service_unavailable",
            StreamFailureKind::Network => "network",
            StreamFailureKind::Remote => "remote",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub kind: StreamFailureKind,
    pub detail: String,
}

impl StreamFailure {
    pub fn new(kind: StreamFailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = match err.status() {
            Some(status) => StreamFailureKind::from_status(status.as_u16(), ""),
            None => StreamFailureKind::Network,
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind.message(), self.kind, self.detail)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key not found: set {var} in the environment or the secrets file")]
    MissingCredential { var: String },

    #[error("model catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("stream failed: {0}")]
    Stream(StreamFailure),

    #[error("unsupported image upload: {0}")]
    UnsupportedImage(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("invalid conversation state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StreamFailure> for ChatError {
    fn from(failure: StreamFailure) -> Self {
        ChatError::Stream(failure)
    }
}

impl ChatError {
    /// Text shown to the user; raw details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Stream(failure) => failure.kind.message().to_string(),
            other => other.to_string(),
        }
    }

    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            ChatError::Stream(failure) => Some(failure.kind.remedy()),
            ChatError::MissingCredential { .. } =>
                Some("Check your .env file or secrets file."),
            ChatError::UnsupportedImage(_) => Some("Upload a png, jpg or jpeg file."),
            _ => None,
        }
    }
}
