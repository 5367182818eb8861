mod auth_service_impl;
mod categoria_service_impl;
mod historial_service_impl;
mod producto_service_impl;
mod user_service_impl;

pub use auth_service_impl::*;
pub use categoria_service_impl::*;
pub use historial_service_impl::*;
pub use producto_service_impl::*;
pub use user_service_impl::*;
