use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::storage::KeyValueStore;

/// JSON layer over a [`KeyValueStore`] that never surfaces read or write
/// failures to callers: reads fall back to a default, writes report `false`.
#[derive(Clone)]
pub struct Persistence {
    backend: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Returns the stored value for `key`, or `default` when the key is
    /// missing or the document cannot be read or decoded.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.read_raw(key) else {
            return default;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    target: "fincent",
                    event = "storage_decode_failed",
                    key,
                    backend = %self.backend.kind(),
                    error = %err
                );
                default
            }
        }
    }

    /// Like [`load`](Self::load) for array documents, but decodes each record
    /// independently and drops only the ones that fail.
    pub fn load_records<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let items: Vec<Value> = self.load(key, Vec::new());
        let total = items.len();
        let records: Vec<T> = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(
                        target: "fincent",
                        event = "storage_record_skipped",
                        key,
                        index,
                        error = %err
                    );
                    None
                }
            })
            .collect();
        if records.len() != total {
            warn!(
                target: "fincent",
                event = "storage_records_dropped",
                key,
                total,
                kept = records.len()
            );
        }
        records
    }

    /// Serializes and writes `value`. Failures are logged and reported as
    /// `false`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    target: "fincent",
                    event = "storage_encode_failed",
                    key,
                    error = %err
                );
                return false;
            }
        };
        match self.backend.set(key, &data) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    target: "fincent",
                    event = "storage_write_failed",
                    key,
                    backend = %self.backend.kind(),
                    bytes = data.len(),
                    error = %err
                );
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    target: "fincent",
                    event = "storage_remove_failed",
                    key,
                    backend = %self.backend.kind(),
                    error = %err
                );
                false
            }
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(Some(raw)) if !raw.trim().is_empty() => Some(raw),
            Ok(_) => None,
            Err(err) => {
                warn!(
                    target: "fincent",
                    event = "storage_read_failed",
                    key,
                    backend = %self.backend.kind(),
                    error = %err
                );
                None
            }
        }
    }
}
