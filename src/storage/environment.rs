//! Key-value environment: the root path and the instances living under it.
//!
//! The root path is fixed the first time an instance is initialized and can
//! not change afterwards. Each environment is independent, so tests simply
//! build their own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::debug;

use crate::error::StorageError;
use crate::listener::DEFAULT_INSTANCE;
use crate::storage::memory::MemoryKvStore;
use crate::storage::traits::ChangeObserver;

/// Environment variable overriding the default root path.
pub const ROOT_PATH_ENV: &str = "STATEWIRE_KV_ROOT";

/// Platform default for the key-value root.
///
/// Uses `STATEWIRE_KV_ROOT` when set, otherwise `<temp>/statewire`.
pub fn default_root_path() -> Result<PathBuf, StorageError> {
    match std::env::var_os(ROOT_PATH_ENV) {
        Some(value) if value.is_empty() => Err(StorageError::MissingRootPath),
        Some(value) => Ok(PathBuf::from(value)),
        None => Ok(std::env::temp_dir().join("statewire")),
    }
}

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Owner of the key-value root and its instances.
#[derive(Default)]
pub struct KvEnvironment {
    root: OnceLock<PathBuf>,
    requested_root: Mutex<Option<PathBuf>>,
    instances: RwLock<HashMap<String, Arc<MemoryKvStore>>>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl std::fmt::Debug for KvEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEnvironment")
            .field("root", &self.root.get())
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl KvEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the observer every instance created from now on reports to.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Choose the root path used when the first instance is initialized.
    ///
    /// Fails with [`StorageError::AlreadyInitialized`] once the root is fixed.
    pub fn set_root_path(&self, path: impl Into<PathBuf>) -> Result<(), StorageError> {
        if let Some(root) = self.root.get() {
            return Err(StorageError::AlreadyInitialized {
                path: root.display().to_string(),
            });
        }
        let mut requested = self.requested_root.lock().map_err(|_| lock_err("kv root"))?;
        *requested = Some(path.into());
        Ok(())
    }

    /// The fixed root path, if any instance has been initialized.
    #[must_use]
    pub fn root_path(&self) -> Option<&Path> {
        self.root.get().map(PathBuf::as_path)
    }

    fn resolve_root(&self) -> Result<&Path, StorageError> {
        if let Some(root) = self.root.get() {
            return Ok(root.as_path());
        }
        let requested = self
            .requested_root
            .lock()
            .map_err(|_| lock_err("kv root"))?
            .clone();
        let candidate = match requested {
            Some(path) => path,
            None => default_root_path()?,
        };
        // A concurrent initializer may have won; either way the stored value is final.
        Ok(self.root.get_or_init(|| candidate).as_path())
    }

    /// Initialize (or fetch) an instance. `None` selects the default instance.
    pub fn initialize_instance(&self, id: Option<&str>) -> Result<Arc<MemoryKvStore>, StorageError> {
        let id = id.unwrap_or(DEFAULT_INSTANCE);
        if let Some(existing) = self
            .instances
            .read()
            .map_err(|_| lock_err("kv instances"))?
            .get(id)
        {
            return Ok(Arc::clone(existing));
        }

        let root = self.resolve_root()?.to_path_buf();
        let mut instances = self.instances.write().map_err(|_| lock_err("kv instances"))?;
        let store = instances.entry(id.to_string()).or_insert_with(|| {
            let mut store = MemoryKvStore::new(id).with_path(root.join(id));
            if let Some(observer) = &self.observer {
                store = store.with_observer(Arc::clone(observer));
            }
            debug!(instance = %id, root = %root.display(), "initialized kv instance");
            Arc::new(store)
        });
        Ok(Arc::clone(store))
    }

    /// Fetch an initialized instance. `None` selects the default instance.
    pub fn instance(&self, id: Option<&str>) -> Result<Arc<MemoryKvStore>, StorageError> {
        let id = id.unwrap_or(DEFAULT_INSTANCE);
        self.instances
            .read()
            .map_err(|_| lock_err("kv instances"))?
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotInitialized {
                instance: id.to_string(),
            })
    }

    #[must_use]
    pub fn is_instance_initialized(&self, id: Option<&str>) -> bool {
        let id = id.unwrap_or(DEFAULT_INSTANCE);
        self.instances
            .read()
            .map(|instances| instances.contains_key(id))
            .unwrap_or(false)
    }
}
