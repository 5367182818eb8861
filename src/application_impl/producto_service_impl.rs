use crate::application_port::ProductoService;
use crate::domain_model::{Page, Producto, ProductoFilters, ProductoForm};
use crate::gateway::{ApiError, ApiGateway, ApiRequest};
use crate::validation::{validate_producto, validate_stock_delta};
use std::sync::Arc;
use tracing::info;

pub struct RealProductoService {
    gateway: Arc<ApiGateway>,
}

impl RealProductoService {
    pub fn new(gateway: Arc<ApiGateway>) -> RealProductoService {
        RealProductoService { gateway }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.gateway.resources().productos)
    }
}

#[async_trait::async_trait]
impl ProductoService for RealProductoService {
    async fn list(&self, page: u32, size: u32) -> Result<Page<Producto>, ApiError> {
        let request = ApiRequest::get(self.path(""))
            .param("page", page)
            .param("size", size);
        self.gateway.send_json(request).await
    }

    async fn search(
        &self,
        filters: &ProductoFilters,
        page: u32,
        size: u32,
    ) -> Result<Page<Producto>, ApiError> {
        let request = ApiRequest::get(self.path("/buscar"))
            .param("page", page)
            .param("size", size)
            .query(filters.to_query());
        self.gateway.send_json(request).await
    }

    async fn get(&self, id: i64) -> Result<Producto, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path(&format!("/{id}"))))
            .await
    }

    async fn create(&self, form: &ProductoForm) -> Result<Producto, ApiError> {
        validate_producto(form)?;
        let request = ApiRequest::post(self.path("")).with_json(form)?;
        let created: Producto = self.gateway.send_json(request).await?;
        info!(id = ?created.id, nombre = %created.nombre, "producto created");
        Ok(created)
    }

    async fn update(&self, id: i64, form: &ProductoForm) -> Result<Producto, ApiError> {
        validate_producto(form)?;
        let request = ApiRequest::put(self.path(&format!("/{id}"))).with_json(form)?;
        self.gateway.send_json(request).await
    }

    async fn update_stock(&self, id: i64, cantidad: i32) -> Result<Producto, ApiError> {
        validate_stock_delta(cantidad)?;
        let request = ApiRequest::patch(self.path(&format!("/{id}/stock"))).param("cantidad", cantidad);
        let updated: Producto = self.gateway.send_json(request).await?;
        info!(id, cantidad, actual = updated.cantidad_actual, "stock adjusted");
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send_empty(ApiRequest::delete(self.path(&format!("/{id}"))))
            .await
    }

    async fn low_stock(&self, minimo: i32) -> Result<Vec<Producto>, ApiError> {
        let request = ApiRequest::get(self.path("/stock-bajo")).param("minimo", minimo);
        self.gateway.send_json(request).await
    }

    async fn categorias(&self) -> Result<Vec<String>, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path("/categorias")))
            .await
    }

    async fn valor_total(&self) -> Result<f64, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path("/valor-total")))
            .await
    }
}
