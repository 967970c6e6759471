//! In-memory key-value backend.
//!
//! Thread-safe [`KeyValueStore`] used for embedded hosts and tests. Values are
//! kept as the raw text a durable engine would hold, so reads go through the
//! same [`StoredValue::resolve`] path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::StorageError;
use crate::listener::{ChangeEvent, ChangeSource};
use crate::storage::traits::{ChangeObserver, KeyValueStore};
use crate::value::StoredValue;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// In-memory key-value instance.
pub struct MemoryKvStore {
    instance_id: String,
    path: Option<PathBuf>,
    entries: RwLock<HashMap<String, String>>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl std::fmt::Debug for MemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKvStore")
            .field("instance_id", &self.instance_id)
            .field("path", &self.path)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryKvStore {
    #[must_use]
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            path: None,
            entries: RwLock::new(HashMap::new()),
            observer: None,
        }
    }

    /// Record the on-disk location this instance is associated with.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, key: &str) {
        if let Some(observer) = &self.observer {
            observer.on_change(&ChangeEvent::new(ChangeSource::key(&self.instance_id, key)));
        }
    }
}

impl KeyValueStore for MemoryKvStore {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        let Some(text) = value.encode() else {
            self.remove(key)?;
            return Ok(());
        };

        let changed = {
            let mut entries = self.entries.write().map_err(|_| lock_err("kv entries"))?;
            match entries.get(key) {
                Some(existing) if *existing == text => false,
                _ => {
                    entries.insert(key.to_string(), text);
                    true
                }
            }
        };

        // Rewriting the same text is not a change.
        if changed {
            self.notify(key);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<StoredValue, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("kv entries"))?;
        Ok(StoredValue::resolve(entries.get(key).map(String::as_str)))
    }

    fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("kv entries"))?;
        Ok(entries.contains_key(key))
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let existed = {
            let mut entries = self.entries.write().map_err(|_| lock_err("kv entries"))?;
            entries.remove(key).is_some()
        };
        if existed {
            self.notify(key);
        }
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| lock_err("kv entries"))?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ChangeSource>>,
    }

    impl ChangeObserver for Recorder {
        fn on_change(&self, event: &ChangeEvent) {
            self.seen.lock().unwrap().push(event.source.clone());
        }
    }

    #[test]
    fn typed_reads_follow_resolution_order() {
        let kv = MemoryKvStore::new("t");
        kv.set("flag", StoredValue::Bool(true)).unwrap();
        kv.set("latency", StoredValue::Number(42.0)).unwrap();
        kv.set("type", StoredValue::from("wifi")).unwrap();

        assert_eq!(kv.get("flag").unwrap(), StoredValue::Bool(true));
        assert_eq!(kv.get("latency").unwrap(), StoredValue::Number(42.0));
        assert_eq!(kv.get("type").unwrap(), StoredValue::String("wifi".to_string()));
        assert_eq!(kv.get("missing").unwrap(), StoredValue::Null);
    }

    #[test]
    fn null_write_removes_key() {
        let kv = MemoryKvStore::new("t");
        kv.set("k", StoredValue::from("v")).unwrap();
        kv.set("k", StoredValue::Null).unwrap();
        assert!(!kv.contains_key("k").unwrap());
        assert!(!kv.remove("k").unwrap());
    }

    #[test]
    fn observer_sees_only_real_changes() {
        let recorder = Arc::new(Recorder::default());
        let kv = MemoryKvStore::new("network").with_observer(recorder.clone());

        kv.set("IS_CONNECTED", StoredValue::Bool(true)).unwrap();
        kv.set("IS_CONNECTED", StoredValue::Bool(true)).unwrap();
        kv.set("IS_CONNECTED", StoredValue::Bool(false)).unwrap();
        kv.remove("IS_CONNECTED").unwrap();
        kv.remove("IS_CONNECTED").unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ChangeSource::key("network", "IS_CONNECTED"));
    }

    #[test]
    fn keys_are_sorted() {
        let kv = MemoryKvStore::new("t");
        for k in ["b", "c", "a"] {
            kv.set(k, StoredValue::Bool(true)).unwrap();
        }
        assert_eq!(kv.keys().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(kv.len(), 3);
    }
}
