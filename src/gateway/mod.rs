mod client;
mod error;
pub mod interceptor;
mod request;

pub use client::*;
pub use error::*;
pub use request::*;
