mod auth_service;
mod categoria_service;
mod historial_service;
mod producto_service;
mod user_service;

pub use auth_service::*;
pub use categoria_service::*;
pub use historial_service::*;
pub use producto_service::*;
pub use user_service::*;
