//! Process-wide tracing setup shared by the `inventory` CLI and the `fake-backend` binary.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
