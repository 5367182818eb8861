use crate::domain_port::{RefreshError, StorageError};
use crate::validation::ValidationErrors;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    /// The request was already replayed once after a refresh and was refused again.
    #[error("unauthorized ({status})")]
    Unauthorized { status: u16 },
    #[error("forbidden: insufficient permissions")]
    Forbidden,
    #[error("session refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_builder() {
            ApiError::InvalidRequest(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl ApiError {
    /// The session is gone or was never there; the caller should go to login.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden | ApiError::Refresh(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status } | ApiError::Api { status, .. } => Some(*status),
            ApiError::Forbidden => Some(403),
            _ => None,
        }
    }

    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
            error: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.trim().to_string()
                }
            });
        ApiError::Api { status, message }
    }
}
