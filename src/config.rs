//! Runtime configuration.
//!
//! Both structs deserialize from JSON with every field optional, so hosts
//! only spell out what they override.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};
use crate::listener::{DEFAULT_MAX_LISTENERS, DEFAULT_STREAM_CAPACITY};
use crate::network::endpoints::DEFAULT_ENDPOINTS;
use crate::network::publish::NETWORK_INSTANCE;

/// Network monitor configuration.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Evaluation interval with active pinging on.
    pub active_interval_ms: u64,
    /// Evaluation interval in passive mode.
    pub passive_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Endpoints used while no custom list is set.
    pub default_endpoints: Vec<String>,
    /// Max queued connectivity events before new ones are dropped.
    pub connectivity_queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            active_interval_ms: 10_000,
            passive_interval_ms: 30_000,
            probe_timeout_ms: 10_000,
            default_endpoints: DEFAULT_ENDPOINTS.iter().map(ToString::to_string).collect(),
            connectivity_queue_capacity: 256,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub const fn interval(&self, active_ping_mode: bool) -> Duration {
        if active_ping_mode {
            Duration::from_millis(self.active_interval_ms)
        } else {
            Duration::from_millis(self.passive_interval_ms)
        }
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> WireResult<()> {
        if self.active_interval_ms == 0 {
            return Err(WireError::invalid_config("active_interval_ms must be > 0"));
        }
        if self.passive_interval_ms == 0 {
            return Err(WireError::invalid_config("passive_interval_ms must be > 0"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(WireError::invalid_config("probe_timeout_ms must be > 0"));
        }
        if self.default_endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(WireError::invalid_config("default_endpoints must not be empty"));
        }
        if self.connectivity_queue_capacity == 0 {
            return Err(WireError::invalid_config("connectivity_queue_capacity must be > 0"));
        }
        Ok(())
    }
}

/// Top-level configuration for [`StateWire`](crate::StateWire).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub debug: bool,
    pub max_listeners: usize,
    /// Per-listener stream buffer.
    pub stream_capacity: usize,
    /// How often owed throttled notifications are flushed.
    pub flush_interval_ms: u64,
    /// Key-value root; the platform default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv_root: Option<PathBuf>,
    /// Instance receiving the network publication keys.
    pub network_instance: String,
    pub monitor: MonitorConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_listeners: DEFAULT_MAX_LISTENERS,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            flush_interval_ms: 50,
            kv_root: None,
            network_instance: NETWORK_INSTANCE.to_string(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl HubConfig {
    /// Parse from JSON.
    pub fn from_json(json: &str) -> WireResult<Self> {
        serde_json::from_str(json).map_err(|e| WireError::invalid_config(format!("config json: {e}")))
    }

    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> WireResult<()> {
        if self.stream_capacity == 0 {
            return Err(WireError::invalid_config("stream_capacity must be > 0"));
        }
        if self.flush_interval_ms == 0 {
            return Err(WireError::invalid_config("flush_interval_ms must be > 0"));
        }
        if self.network_instance.trim().is_empty() {
            return Err(WireError::invalid_config("network_instance must not be empty"));
        }
        self.monitor.validate()
    }
}
