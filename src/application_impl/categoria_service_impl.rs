use crate::application_port::CategoriaService;
use crate::domain_model::{Categoria, CategoriaForm, Page};
use crate::gateway::{ApiError, ApiGateway, ApiRequest};
use crate::validation::validate_categoria;
use std::sync::Arc;

pub struct RealCategoriaService {
    gateway: Arc<ApiGateway>,
}

impl RealCategoriaService {
    pub fn new(gateway: Arc<ApiGateway>) -> RealCategoriaService {
        RealCategoriaService { gateway }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.gateway.resources().categorias)
    }
}

#[async_trait::async_trait]
impl CategoriaService for RealCategoriaService {
    async fn active(&self) -> Result<Vec<Categoria>, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path("/activas")))
            .await
    }

    async fn list(&self, page: u32, size: u32) -> Result<Page<Categoria>, ApiError> {
        let request = ApiRequest::get(self.path(""))
            .param("page", page)
            .param("size", size);
        self.gateway.send_json(request).await
    }

    async fn get(&self, id: i64) -> Result<Categoria, ApiError> {
        self.gateway
            .send_json(ApiRequest::get(self.path(&format!("/{id}"))))
            .await
    }

    async fn create(&self, form: &CategoriaForm) -> Result<Categoria, ApiError> {
        validate_categoria(form)?;
        let request = ApiRequest::post(self.path("")).with_json(form)?;
        self.gateway.send_json(request).await
    }

    async fn update(&self, id: i64, form: &CategoriaForm) -> Result<Categoria, ApiError> {
        validate_categoria(form)?;
        let request = ApiRequest::put(self.path(&format!("/{id}"))).with_json(form)?;
        self.gateway.send_json(request).await
    }

    /// Soft delete: the backend marks the category inactive.
    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send_empty(ApiRequest::delete(self.path(&format!("/{id}"))))
            .await
    }

    async fn search(&self, nombre: &str) -> Result<Vec<Categoria>, ApiError> {
        let request = ApiRequest::get(self.path("/buscar")).param("nombre", nombre);
        self.gateway.send_json(request).await
    }
}
