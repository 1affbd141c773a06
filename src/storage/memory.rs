use std::collections::HashMap;
use std::sync::Mutex;

use super::{check_quota, KeyValueStore, StorageBackend, StorageError};

/// Process-local store. Sharing one instance between two domain stores
/// models two browser tabs over the same storage.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: Option<usize>) -> Self {
        Self {
            data: Mutex::default(),
            quota_bytes,
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.data.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.quota_bytes, key, value)?;
        let mut guard = self.data.lock().map_err(|_| StorageError::Poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.data.lock().map_err(|_| StorageError::Poisoned)?;
        guard.remove(key);
        Ok(())
    }

    fn kind(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_over_quota_and_keeps_previous_value() {
        let store = MemoryStore::with_quota(Some(8));
        store.set("entities", "[]").unwrap();
        let err = store.set("entities", "[\"0123456789\"]").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 8, .. }));
        assert_eq!(store.get("entities").unwrap().as_deref(), Some("[]"));
    }
}
