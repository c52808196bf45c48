//! Error taxonomy for the orchestration subsystem.
//!
//! [`PipelineError`] is the crate-wide error type. [`ErrorKind`] is a
//! classified, provider-agnostic tag — every HTTP failure, configuration
//! problem, and response-shape mismatch collapses into one of these so
//! callers (Worker, Router, CLI) can branch on kind without matching on
//! raw status codes.

use std::time::Duration;
use thiserror::Error;

/// Classified error kind, independent of which provider produced it.
///
/// Used for routing decisions (exclude an unhealthy provider), user-facing
/// messages, and the retry engine's retryability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationError,
    RateLimitError,
    InvalidRequest,
    ServiceUnavailable,
    NetworkError,
    ConfigurationError,
    ModelNotFound,
    ServerUnreachable,
    NoContentInResponse,
    InvalidResponseFormat,
    UnexpectedResponseFormat,
    UnknownError,
}

impl ErrorKind {
    /// Classify an HTTP status code into an [`ErrorKind`].
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::InvalidRequest,
            401 | 403 => ErrorKind::AuthenticationError,
            404 => ErrorKind::ModelNotFound,
            429 => ErrorKind::RateLimitError,
            500..=599 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::UnknownError,
        }
    }

    /// Short one-line reason shown to the user.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationError => "authentication failed",
            ErrorKind::RateLimitError => "rate limited",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::ServiceUnavailable => "service unavailable",
            ErrorKind::NetworkError => "network error",
            ErrorKind::ConfigurationError => "invalid configuration",
            ErrorKind::ModelNotFound => "model not found",
            ErrorKind::ServerUnreachable => "local server unreachable",
            ErrorKind::NoContentInResponse => "no content in response",
            ErrorKind::InvalidResponseFormat => "invalid response format",
            ErrorKind::UnexpectedResponseFormat => "unexpected response format",
            ErrorKind::UnknownError => "unknown error",
        }
    }

    /// Resolution hint for credential/network issues. `None`
    /// when the kind doesn't warrant one.
    pub fn resolution_hint(&self) -> Option<&'static str> {
        match self {
            ErrorKind::AuthenticationError => Some("check API key"),
            ErrorKind::NetworkError | ErrorKind::ServerUnreachable => {
                Some("start local server")
            }
            ErrorKind::ConfigurationError => Some("check provider configuration"),
            _ => None,
        }
    }

    /// User-visible message: reason, plus a resolution hint when present.
    pub fn user_message(&self) -> String {
        match self.resolution_hint() {
            Some(hint) => format!("{} ({})", self.reason(), hint),
            None => self.reason().to_string(),
        }
    }
}

/// Errors produced by the orchestration subsystem and its adapters.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A named stage or task failed with a descriptive message.
    #[error("'{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// The call was cancelled via the cancellation flag or router deadline.
    #[error("operation was cancelled")]
    Cancelled,

    /// Invalid configuration detected at build/startup time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// A classified provider/transport error.
    #[error("{kind_message}")]
    Classified {
        kind: ErrorKind,
        kind_message: String,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Build a classified error with the kind's default reason text.
    pub fn classified(kind: ErrorKind) -> Self {
        PipelineError::Classified {
            kind,
            kind_message: kind.user_message(),
        }
    }

    /// Build a classified error with a custom message (kind preserved for matching).
    pub fn classified_with(kind: ErrorKind, message: impl Into<String>) -> Self {
        PipelineError::Classified {
            kind,
            kind_message: message.into(),
        }
    }

    /// Best-effort classification of this error into an [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Classified { kind, .. } => *kind,
            PipelineError::HttpError { status, .. } => ErrorKind::from_status(*status),
            PipelineError::Request(_) => ErrorKind::NetworkError,
            PipelineError::Json(_) => ErrorKind::InvalidResponseFormat,
            PipelineError::InvalidConfig(_) => ErrorKind::ConfigurationError,
            _ => ErrorKind::UnknownError,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
