use crate::domain_model::{Page, Producto, ProductoFilters, ProductoForm};
use crate::gateway::ApiError;

pub const DEFAULT_STOCK_MINIMO: i32 = 10;

#[async_trait::async_trait]
pub trait ProductoService: Send + Sync {
    async fn list(&self, page: u32, size: u32) -> Result<Page<Producto>, ApiError>;
    async fn search(
        &self,
        filters: &ProductoFilters,
        page: u32,
        size: u32,
    ) -> Result<Page<Producto>, ApiError>;
    async fn get(&self, id: i64) -> Result<Producto, ApiError>;
    async fn create(&self, form: &ProductoForm) -> Result<Producto, ApiError>;
    async fn update(&self, id: i64, form: &ProductoForm) -> Result<Producto, ApiError>;
    /// Adds `cantidad` (negative to remove) to the current stock.
    async fn update_stock(&self, id: i64, cantidad: i32) -> Result<Producto, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
    async fn low_stock(&self, minimo: i32) -> Result<Vec<Producto>, ApiError>;
    async fn categorias(&self) -> Result<Vec<String>, ApiError>;
    async fn valor_total(&self) -> Result<f64, ApiError>;
}
