//! Change notifications routed to listeners.
//!
//! These types are serializable so hosts can forward them across an FFI or
//! IPC boundary unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used when a caller does not name a key-value instance.
pub const DEFAULT_INSTANCE: &str = "default";

/// Database name used when a caller does not name one.
pub const DEFAULT_DATABASE: &str = "default";

/// Where a change happened.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeSource {
    /// A key was written or removed in a key-value instance.
    KeyValue { instance: String, key: String },

    /// Rows changed in a relational database.
    ///
    /// `table` is `None` when the engine could not attribute the change.
    Relational {
        database: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
}

impl ChangeSource {
    #[must_use]
    pub fn key(instance: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KeyValue {
            instance: instance.into(),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Relational {
            database: database.into(),
            table: Some(table.into()),
        }
    }
}

/// A state change observed in one of the stores.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub source: ChangeSource,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(source: ChangeSource) -> Self {
        Self::at(source, Utc::now())
    }

    #[must_use]
    pub fn at(source: ChangeSource, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            source,
            timestamp,
        }
    }
}

/// What a listener stream receives when its gate fires.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerEvent {
    pub listener_id: String,
    pub change: ChangeEvent,
    /// True when this is the trailing delivery of an event suppressed during a
    /// throttle window.
    pub deferred: bool,
    pub delivered_at: DateTime<Utc>,
}
