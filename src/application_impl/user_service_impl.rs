use crate::application_port::UserService;
use crate::domain_model::{Page, User, UserForm, UserUpdate};
use crate::gateway::{ApiError, ApiGateway, ApiRequest};
use crate::validation::validate_user;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RealUserService {
    gateway: Arc<ApiGateway>,
}

impl RealUserService {
    pub fn new(gateway: Arc<ApiGateway>) -> RealUserService {
        RealUserService { gateway }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.gateway.resources().users)
    }
}

/// Older backends answer `/users` with a bare list and have no search route.
/// Anything that looks like a missing feature gets a local fallback; auth
/// failures and transport problems do not.
fn wants_local_fallback(err: &ApiError) -> bool {
    match err {
        ApiError::Api { status, .. } => matches!(status, 404 | 405) || *status >= 500,
        ApiError::Decode(_) => true,
        _ => false,
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn list_all(&self) -> Result<Vec<User>, ApiError> {
        self.gateway.send_json(ApiRequest::get(self.path(""))).await
    }

    async fn list(&self, page: u32, size: u32) -> Result<Page<User>, ApiError> {
        let request = ApiRequest::get(self.path(""))
            .param("page", page)
            .param("size", size);
        match self.gateway.send_json(request).await {
            Ok(page) => Ok(page),
            Err(e) if wants_local_fallback(&e) => {
                warn!(error = %e, "users endpoint cannot paginate, paging locally");
                let all = self.list_all().await?;
                Ok(Page::from_slice(&all, page, size))
            }
            Err(e) => Err(e),
        }
    }

    async fn search(&self, term: &str, page: u32, size: u32) -> Result<Page<User>, ApiError> {
        let request = ApiRequest::get(self.path("/search"))
            .param("page", page)
            .param("size", size)
            .param("search", term);
        match self.gateway.send_json(request).await {
            Ok(page) => Ok(page),
            Err(e) if wants_local_fallback(&e) => {
                warn!(error = %e, "users search unavailable, filtering locally");
                let matching: Vec<User> = self
                    .list_all()
                    .await?
                    .into_iter()
                    .filter(|user| user.matches(term))
                    .collect();
                Ok(Page::from_slice(&matching, page, size))
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: i64) -> Result<User, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path(&format!("/{id}"))))
            .await
    }

    async fn create(&self, form: &UserForm) -> Result<User, ApiError> {
        validate_user(form)?;
        let request =
            ApiRequest::post(self.gateway.endpoints().register.as_str()).with_json(form)?;
        let user: User = self.gateway.send_json(request).await?;
        info!(id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    async fn update(&self, id: i64, update: &UserUpdate) -> Result<User, ApiError> {
        let request = ApiRequest::put(self.path(&format!("/{id}"))).with_json(update)?;
        self.gateway.send_json(request).await
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send_empty(ApiRequest::delete(self.path(&format!("/{id}"))))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_only_for_missing_features() {
        let not_found = ApiError::Api {
            status: 404,
            message: "Not Found".into(),
        };
        assert!(wants_local_fallback(&not_found));
        let server = ApiError::Api {
            status: 503,
            message: String::new(),
        };
        assert!(wants_local_fallback(&server));
        let bad_request = ApiError::Api {
            status: 400,
            message: String::new(),
        };
        assert!(!wants_local_fallback(&bad_request));
        assert!(!wants_local_fallback(&ApiError::Forbidden));
        assert!(!wants_local_fallback(&ApiError::Unauthorized { status: 401 }));
        assert!(!wants_local_fallback(&ApiError::Timeout));
    }
}
