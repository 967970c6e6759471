//! Listener configuration: what a listener watches and how often it may fire.

use serde::{Deserialize, Serialize};

use crate::error::ListenerError;

use super::event::{ChangeSource, DEFAULT_DATABASE, DEFAULT_INSTANCE};

/// Watch keys in a key-value instance.
///
/// An empty `keys` list watches every key of the instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl KeyWatch {
    /// Watch specific keys in the default instance.
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instance: None,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn in_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    fn matches(&self, instance: &str, key: &str) -> bool {
        let watched = self.instance.as_deref().unwrap_or(DEFAULT_INSTANCE);
        watched == instance && (self.keys.is_empty() || self.keys.iter().any(|k| k == key))
    }
}

/// Watch tables in a relational database.
///
/// An empty `tables` list watches every table, including changes the engine
/// could not attribute to a table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
}

impl TableWatch {
    /// Watch specific tables in the default database.
    #[must_use]
    pub fn tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            database: None,
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    fn matches(&self, database: &str, table: Option<&str>) -> bool {
        let watched = self.database.as_deref().unwrap_or(DEFAULT_DATABASE);
        if watched != database {
            return false;
        }
        if self.tables.is_empty() {
            return true;
        }
        table.is_some_and(|t| self.tables.iter().any(|w| w.eq_ignore_ascii_case(t)))
    }
}

/// Watch both sides at once.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedWatch {
    pub key_value: KeyWatch,
    pub relational: TableWatch,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerOptions {
    /// Minimum spacing between fired notifications, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
}

/// Listener configuration.
///
/// At least one of `key_value`, `relational` or `combined` must be set.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value: Option<KeyWatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational: Option<TableWatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<CombinedWatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ListenerOptions>,
}

impl ListenerConfig {
    #[must_use]
    pub fn key_value(watch: KeyWatch) -> Self {
        Self {
            key_value: Some(watch),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn relational(watch: TableWatch) -> Self {
        Self {
            relational: Some(watch),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn combined(watch: CombinedWatch) -> Self {
        Self {
            combined: Some(watch),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.options = Some(ListenerOptions {
            throttle_ms: Some(throttle_ms),
        });
        self
    }

    /// The configured throttle window, if any.
    #[must_use]
    pub fn throttle_ms(&self) -> Option<u64> {
        self.options.and_then(|o| o.throttle_ms)
    }

    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.key_value.is_none() && self.relational.is_none() && self.combined.is_none() {
            return Err(ListenerError::InvalidConfig {
                reason: "At least one of key_value, relational, or combined must be specified".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a change from `source` concerns this listener.
    #[must_use]
    pub fn watches(&self, source: &ChangeSource) -> bool {
        match source {
            ChangeSource::KeyValue { instance, key } => {
                self.key_value.as_ref().is_some_and(|w| w.matches(instance, key))
                    || self
                        .combined
                        .as_ref()
                        .is_some_and(|c| c.key_value.matches(instance, key))
            }
            ChangeSource::Relational { database, table } => {
                let table = table.as_deref();
                self.relational.as_ref().is_some_and(|w| w.matches(database, table))
                    || self
                        .combined
                        .as_ref()
                        .is_some_and(|c| c.relational.matches(database, table))
            }
        }
    }
}
