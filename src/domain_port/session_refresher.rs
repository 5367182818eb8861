use crate::domain_model::AccessToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    /// A request came back 401/403.
    Reactive,
    /// The token store saw the access token close to expiry.
    Proactive,
}

/// Outcome shared by the refresh leader and every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("refresh token rejected by backend ({status})")]
    Rejected { status: u16 },
    #[error("refresh endpoint unavailable ({status})")]
    Unavailable { status: u16 },
    #[error("refresh request timed out")]
    Timeout,
    #[error("refresh transport failed: {0}")]
    Transport(String),
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
    #[error("refreshed session could not be stored: {0}")]
    Storage(String),
    #[error("refresh abandoned before completion")]
    Abandoned,
}

impl RefreshError {
    /// The stored refresh token can no longer be used, whatever the caller wants.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            RefreshError::MissingRefreshToken
                | RefreshError::Rejected { .. }
                | RefreshError::InvalidResponse(_)
                | RefreshError::Storage(_)
        )
    }
}

#[async_trait::async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh_session(&self, origin: RefreshOrigin) -> Result<AccessToken, RefreshError>;
}
