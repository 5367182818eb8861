use crate::domain_model::{HistorialQuery, Movimiento, Page};
use crate::gateway::ApiError;

#[async_trait::async_trait]
pub trait HistorialService: Send + Sync {
    async fn list(&self, query: &HistorialQuery) -> Result<Page<Movimiento>, ApiError>;
}
