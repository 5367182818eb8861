use crate::domain_port::{KeyValueStore, StorageError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Session storage that lives as long as the process.
///
/// One lock covers the whole map, so a multi-key write or read is a single
/// critical section.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_all(&self, updates: &[(&str, String)]) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        for (key, value) in updates {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const KEYS: [&str; 3] = ["accessToken", "refreshToken", "user"];

    #[test]
    fn set_get_remove() {
        let store = MemoryKeyValueStore::new();
        store
            .set_all(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.remove_all(&["a", "missing"]).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(
            store.get_all(&["a", "b"]).unwrap(),
            vec![None, Some("2".to_string())]
        );
    }

    #[test]
    fn readers_never_observe_half_a_write() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let done = done.clone();
            thread::spawn(move || {
                for round in 0..5_000 {
                    let value = round.to_string();
                    store
                        .set_all(&KEYS.map(|key| (key, value.clone())))
                        .unwrap();
                    store.remove_all(&KEYS).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut partial = 0;
        while !done.load(Ordering::SeqCst) {
            let snapshot = store.get_all(&KEYS).unwrap();
            let present = snapshot.iter().filter(|v| v.is_some()).count();
            if present != 0 && present != KEYS.len() {
                partial += 1;
            }
        }
        writer.join().unwrap();

        assert_eq!(partial, 0);
    }
}
