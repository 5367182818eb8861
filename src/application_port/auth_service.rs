use crate::domain_model::{AccessToken, IncompleteAuthResponse, User, UserForm, UserIdentity};
use crate::domain_port::{RefreshError, StorageError};
use crate::gateway::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session error: {0}")]
    Session(#[from] RefreshError),
    #[error("incomplete auth response: {0}")]
    IncompleteResponse(#[from] IncompleteAuthResponse),
    #[error("store error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticates and stores the new session.
    async fn login(&self, request: LoginInput) -> Result<UserIdentity, AuthError>;
    /// Tells the backend, then drops the local session whatever it answered.
    async fn logout(&self);
    async fn refresh_token(&self) -> Result<AccessToken, AuthError>;
    async fn validate_token(&self) -> bool;
    async fn register(&self, form: UserForm) -> Result<User, AuthError>;
    fn is_authenticated(&self) -> bool;
    fn current_user(&self) -> Option<UserIdentity>;
}
