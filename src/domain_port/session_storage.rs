#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Durable string key-value storage for session data.
///
/// Reads are synchronous because the request interceptor attaches the bearer
/// token without suspending. Multi-key writes must land together, and
/// `get_all` must read one consistent snapshot.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError>;
    fn set_all(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError>;
}
