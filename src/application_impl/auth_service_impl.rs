use crate::application_port::{AuthError, AuthService, LoginInput};
use crate::domain_model::{
    AccessToken, AuthResponse, LoginRequest, RefreshTokenRequest, User, UserForm, UserIdentity,
};
use crate::domain_port::RefreshOrigin;
use crate::gateway::{ApiError, ApiGateway, ApiRequest};
use crate::session::claims::expiry_of;
use crate::validation::validate_user;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RealAuthService {
    gateway: Arc<ApiGateway>,
}

impl RealAuthService {
    pub fn new(gateway: Arc<ApiGateway>) -> RealAuthService {
        RealAuthService { gateway }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<UserIdentity, AuthError> {
        let body = LoginRequest {
            username: request.username,
            password: request.password,
        };
        let http = ApiRequest::post(self.gateway.endpoints().login.as_str())
            .with_json(&body)
            .map_err(ApiError::from)?;

        let response: AuthResponse = match self.gateway.send_json(http).await {
            Ok(response) => response,
            Err(ApiError::Api {
                status: 400 | 401, ..
            }) => {
                warn!(username = %body.username, "login refused");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let credential = response.into_credential(expiry_of)?;
        self.gateway.token_store().set_session(&credential)?;
        info!(username = %credential.user.username, role = %credential.user.role, "logged in");
        Ok(credential.user)
    }

    async fn logout(&self) {
        let store = self.gateway.token_store();
        let mut request = ApiRequest::post(self.gateway.endpoints().logout.as_str());
        if let Some(refresh_token) = store.refresh_token() {
            match request.clone().with_json(&RefreshTokenRequest {
                refresh_token: refresh_token.0,
            }) {
                Ok(with_body) => request = with_body,
                Err(e) => warn!(error = %e, "logout body not encodable"),
            }
        }
        if let Err(e) = self.gateway.send_empty(request).await {
            warn!(error = %e, "backend logout failed, clearing local session anyway");
        }
        store.clear_session();
    }

    async fn refresh_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self
            .gateway
            .refresh_session(RefreshOrigin::Reactive)
            .await?)
    }

    async fn validate_token(&self) -> bool {
        if self.gateway.token_store().access_token().is_none() {
            return false;
        }
        let request = ApiRequest::post(self.gateway.endpoints().validate.as_str());
        match self.gateway.send_empty(request).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "token validation failed");
                false
            }
        }
    }

    async fn register(&self, form: UserForm) -> Result<User, AuthError> {
        validate_user(&form).map_err(ApiError::from)?;
        let request = ApiRequest::post(self.gateway.endpoints().register.as_str())
            .with_json(&form)
            .map_err(ApiError::from)?;
        let user: User = self.gateway.send_json(request).await?;
        info!(username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    fn is_authenticated(&self) -> bool {
        self.gateway.token_store().is_authenticated()
    }

    fn current_user(&self) -> Option<UserIdentity> {
        self.gateway.token_store().current_user()
    }
}
