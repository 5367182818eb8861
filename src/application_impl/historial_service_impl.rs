use crate::application_port::HistorialService;
use crate::domain_model::{HistorialQuery, Movimiento, Page};
use crate::gateway::{ApiError, ApiGateway, ApiRequest};
use std::sync::Arc;

pub struct RealHistorialService {
    gateway: Arc<ApiGateway>,
}

impl RealHistorialService {
    pub fn new(gateway: Arc<ApiGateway>) -> RealHistorialService {
        RealHistorialService { gateway }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.gateway.resources().historial)
    }
}

#[async_trait::async_trait]
impl HistorialService for RealHistorialService {
    async fn list(&self, query: &HistorialQuery) -> Result<Page<Movimiento>, ApiError> {
        let request = ApiRequest::get(self.path("")).query(query.to_query());
        self.gateway.send_json(request).await
    }
}
