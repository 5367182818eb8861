use crate::domain_model::{Categoria, CategoriaForm, Page};
use crate::gateway::ApiError;

#[async_trait::async_trait]
pub trait CategoriaService: Send + Sync {
    async fn active(&self) -> Result<Vec<Categoria>, ApiError>;
    async fn list(&self, page: u32, size: u32) -> Result<Page<Categoria>, ApiError>;
    async fn get(&self, id: i64) -> Result<Categoria, ApiError>;
    async fn create(&self, form: &CategoriaForm) -> Result<Categoria, ApiError>;
    async fn update(&self, id: i64, form: &CategoriaForm) -> Result<Categoria, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
    async fn search(&self, nombre: &str) -> Result<Vec<Categoria>, ApiError>;
}
