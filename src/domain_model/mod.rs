mod categoria;
mod historial;
mod page;
mod producto;
mod session;
mod user;

pub use categoria::*;
pub use historial::*;
pub use page::*;
pub use producto::*;
pub use session::*;
pub use user::*;
