use crate::domain_model::{AccessToken, AuthResponse, RefreshTokenRequest, SessionCredential};
use crate::domain_port::{RefreshError, RefreshOrigin, SessionRefresher};
use crate::gateway::interceptor::{Verdict, classify};
use crate::gateway::{ApiError, ApiRequest};
use crate::session::claims::{expiry_of, is_live};
use crate::session::{RefreshCoordinator, RefreshTurn, TokenStore};
use crate::settings::{Api, Endpoints, Resources};
use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub endpoints: Endpoints,
    pub resources: Resources,
}

impl From<&Api> for GatewayConfig {
    fn from(api: &Api) -> Self {
        Self {
            base_url: api.base_url.clone(),
            timeout: Duration::from_millis(api.timeout_ms),
            endpoints: api.endpoints.clone(),
            resources: api.resources.clone(),
        }
    }
}

/// The one place HTTP requests leave the client.
///
/// Attaches the bearer token, and turns 401/403 answers into at most one
/// token refresh per burst of failing requests. Requests that fail while a
/// refresh runs wait for it and are replayed with the new token.
pub struct ApiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    tokens: Arc<TokenStore>,
    refresh: RefreshCoordinator,
}

impl ApiGateway {
    pub fn new(config: GatewayConfig, tokens: Arc<TokenStore>) -> Result<Arc<Self>, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        let gateway = Arc::new(Self {
            client,
            config,
            tokens,
            refresh: RefreshCoordinator::new(),
        });
        let weak: Weak<ApiGateway> = Arc::downgrade(&gateway);
        gateway.tokens.attach_refresher(weak);
        Ok(gateway)
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    pub fn resources(&self) -> &Resources {
        &self.config.resources
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&AccessToken>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(&token.0);
        }
        Ok(builder.send().await?)
    }

    /// Sends `request`, refreshing the session and replaying once on 401/403.
    /// Returns the response only when its status is 2xx.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<reqwest::Response, ApiError> {
        // Generation first: the bearer read after it is never older.
        let seen = self.refresh.generation();
        let mut bearer = self.tokens.access_token();
        loop {
            let bearer_live = bearer.as_ref().is_some_and(|t| is_live(t, Utc::now()));
            let response = self.send(&request, bearer.as_ref()).await?;
            let status = response.status().as_u16();

            match classify(status, &request, bearer_live, &self.config.endpoints) {
                Verdict::Pass if response.status().is_success() => return Ok(response),
                Verdict::Pass => {
                    let body = response.text().await.unwrap_or_default();
                    debug!(path = %request.path, status, "request failed");
                    return Err(ApiError::from_body(status, &body));
                }
                Verdict::Reject => {
                    warn!(path = %request.path, status, "still unauthorized after refresh");
                    return Err(ApiError::Unauthorized { status });
                }
                Verdict::Deny => {
                    warn!(path = %request.path, "access denied for current role, ending session");
                    self.tokens.clear_session();
                    return Err(ApiError::Forbidden);
                }
                Verdict::Refresh => {
                    request.mark_retried();
                    let current = self.tokens.access_token();
                    if current.is_some() && current != bearer {
                        debug!(path = %request.path, "token changed while in flight, replaying");
                        bearer = current;
                        continue;
                    }
                    debug!(path = %request.path, status, "access token refused, refreshing");
                    bearer = Some(self.refresh_after(RefreshOrigin::Reactive, Some(seen)).await?);
                }
            }
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    /// Renews the session, or waits for the renewal already under way.
    ///
    /// Only the leader touches the backend and the store. On failure the
    /// session is cleared unless the refresh was proactive, nobody was
    /// waiting on it, and the backend did not refuse the refresh token.
    pub async fn refresh_session(&self, origin: RefreshOrigin) -> Result<AccessToken, RefreshError> {
        self.refresh_after(origin, None).await
    }

    /// With `seen` set, a refresh that completed after that generation is
    /// reused instead of starting another one.
    async fn refresh_after(
        &self,
        origin: RefreshOrigin,
        seen: Option<u64>,
    ) -> Result<AccessToken, RefreshError> {
        let leader = match self.refresh.begin_refresh(seen) {
            RefreshTurn::Replay(token) => return Ok(token),
            RefreshTurn::Follower(waiter) => return waiter.wait().await,
            RefreshTurn::Leader(leader) => leader,
        };

        let outcome = match self.request_new_tokens().await {
            Ok(credential) => self
                .tokens
                .set_session(&credential)
                .map(|()| credential.access_token)
                .map_err(|e| RefreshError::Storage(e.to_string())),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(token) => {
                let released = leader.resolve_all(token.clone());
                info!(released, ?origin, "session refreshed");
                Ok(token)
            }
            Err(err) => {
                let released = leader.reject_all(err.clone());
                if origin == RefreshOrigin::Reactive || err.ends_session() || released > 0 {
                    self.tokens.clear_session();
                } else {
                    debug!(error = %err, "keeping session after failed proactive refresh");
                }
                Err(err)
            }
        }
    }

    async fn request_new_tokens(&self) -> Result<SessionCredential, RefreshError> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;
        let request = ApiRequest::post(self.config.endpoints.refresh.as_str())
            .with_json(&RefreshTokenRequest {
                refresh_token: refresh_token.0,
            })
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        let bearer = self.tokens.access_token();
        let response = self
            .send(&request, bearer.as_ref())
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(RefreshError::Unavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_failure(e.into()))?;
        let mut body: AuthResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if body.username.is_none() {
            if let Some(user) = self.tokens.current_user() {
                body.username = Some(user.username);
                body.email = Some(user.email);
                body.nombre_completo = Some(user.nombre_completo);
                body.role = Some(user.role);
            }
        }
        body.into_credential(expiry_of)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))
    }
}

fn transport_failure(err: ApiError) -> RefreshError {
    match err {
        ApiError::Timeout => RefreshError::Timeout,
        ApiError::Transport(reason) => RefreshError::Transport(reason),
        other => RefreshError::Transport(other.to_string()),
    }
}

#[async_trait::async_trait]
impl SessionRefresher for ApiGateway {
    async fn refresh_session(&self, origin: RefreshOrigin) -> Result<AccessToken, RefreshError> {
        ApiGateway::refresh_session(self, origin).await
    }
}
