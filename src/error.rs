use std::time::Duration;

use thiserror::Error;

/// Error taxonomy for one embedding session.
///
/// Variants carry owned strings rather than source errors so the whole enum
/// stays `Clone`. Retry helpers and the state machine both need to hold on to
/// a failure after reporting it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("link session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("connection definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("connection submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("authorization failed: {0}")]
    OAuthFailed(String),

    #[error("oauth client is not configured for {0}")]
    OAuthNotConfigured(String),

    #[error("link session expired while awaiting authorization")]
    SessionExpired,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid embed payload: {0}")]
    InvalidPayload(String),

    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl Error {
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        Error::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Whether a retry with the same input can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout { .. })
    }

    /// Whether the user can fix this in place (resubmit the same form)
    /// without reselecting the platform.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SubmissionRejected(_))
    }

    /// Short message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::SessionUnavailable(_) => "Failed to fetch the link session.".to_string(),
            Error::DefinitionNotFound(_) => "This platform does not exist".to_string(),
            Error::SubmissionRejected(msg) | Error::OAuthFailed(msg) => msg.clone(),
            Error::OAuthNotConfigured(_) => {
                "Finish setting up this connection in the configuration page.".to_string()
            }
            Error::SessionExpired => "The session has expired. Please try again.".to_string(),
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
