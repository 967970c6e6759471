//! Abstract storage contracts.
//!
//! The key-value collaborator is modelled as a trait so the network monitor
//! can publish into any backend, and change notification is a trait so
//! stores stay ignorant of who is listening.

use crate::error::StorageError;
use crate::listener::ChangeEvent;
use crate::value::StoredValue;

/// A namespaced key-value store holding untyped text.
///
/// # Safety Considerations
/// - Implementations must be safe to share across threads
/// - Observers must be notified after the store's own lock is released
pub trait KeyValueStore: Send + Sync {
    /// Namespace this store serves.
    fn instance_id(&self) -> &str;

    /// Write a value. Writing [`StoredValue::Null`] removes the key.
    fn set(&self, key: &str, value: StoredValue) -> Result<(), StorageError>;

    /// Read a value; a missing key reads as [`StoredValue::Null`].
    fn get(&self, key: &str) -> Result<StoredValue, StorageError>;

    fn contains_key(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove a key. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// All keys, sorted.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Receives change notifications from the stores.
///
/// Called synchronously on the writing thread. Implementations must not call
/// back into the store that notified them.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}
