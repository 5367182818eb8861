use crate::domain_model::{Page, User, UserForm, UserUpdate};
use crate::gateway::ApiError;

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn list_all(&self) -> Result<Vec<User>, ApiError>;
    async fn list(&self, page: u32, size: u32) -> Result<Page<User>, ApiError>;
    async fn search(&self, term: &str, page: u32, size: u32) -> Result<Page<User>, ApiError>;
    async fn get(&self, id: i64) -> Result<User, ApiError>;
    async fn create(&self, form: &UserForm) -> Result<User, ApiError>;
    async fn update(&self, id: i64, update: &UserUpdate) -> Result<User, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}
