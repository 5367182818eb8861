// storage

mod session_storage;

pub use session_storage::*;

// refresh

mod session_refresher;

pub use session_refresher::*;
