pub mod claims;
mod refresh_queue;
mod token_store;

pub use refresh_queue::*;
pub use token_store::*;
