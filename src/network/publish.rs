//! Publication of monitor state into the key-value store.

use crate::error::StorageError;
use crate::storage::KeyValueStore;
use crate::value::StoredValue;

use super::quality::{InternetQuality, InternetStatus, LinkQuality};
use super::state::NetworkState;

/// Key-value instance the monitor publishes into by default.
pub const NETWORK_INSTANCE: &str = "network";

pub const NETWORK_STATUS: &str = "NETWORK_STATUS";
pub const NETWORK_TYPE: &str = "NETWORK_TYPE";
/// Combined link and probe verdict.
pub const NETWORK_QUALITY: &str = "NETWORK_QUALITY";
/// Present only while on cellular.
pub const CELLULAR_GENERATION: &str = "CELLULAR_GENERATION";
pub const IS_CONNECTED: &str = "IS_CONNECTED";
/// Probe-only quality.
pub const INTERNET_QUALITY: &str = "INTERNET_QUALITY";
pub const INTERNET_LATENCY_MS: &str = "INTERNET_LATENCY_MS";
/// Authoritative verified reachability.
pub const INTERNET_REACHABLE: &str = "INTERNET_REACHABLE";
pub const INTERNET_STATE: &str = "INTERNET_STATE";

/// Snapshot of everything published, computed under the monitor lock.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub network: NetworkState,
    pub combined: LinkQuality,
    pub quality: InternetQuality,
    pub latency_ms: f64,
    pub reachable: bool,
    pub internet_status: InternetStatus,
}

/// Write the device-level keys.
pub fn publish_network(sink: &dyn KeyValueStore, p: &Publication) -> Result<(), StorageError> {
    sink.set(NETWORK_STATUS, p.network.status.as_str().into())?;
    sink.set(NETWORK_TYPE, p.network.connection_type.as_str().into())?;
    sink.set(NETWORK_QUALITY, p.combined.as_str().into())?;
    if p.network.is_cellular() {
        sink.set(CELLULAR_GENERATION, p.network.cellular_generation.as_str().into())?;
    } else {
        sink.remove(CELLULAR_GENERATION)?;
    }
    sink.set(IS_CONNECTED, StoredValue::Bool(p.network.is_connected))?;
    Ok(())
}

/// Write the internet-quality keys.
pub fn publish_internet(sink: &dyn KeyValueStore, p: &Publication) -> Result<(), StorageError> {
    sink.set(INTERNET_QUALITY, p.quality.as_str().into())?;
    sink.set(INTERNET_LATENCY_MS, StoredValue::Number(p.latency_ms))?;
    sink.set(NETWORK_QUALITY, p.combined.as_str().into())?;
    sink.set(INTERNET_REACHABLE, StoredValue::Bool(p.reachable))?;
    sink.set(INTERNET_STATE, p.internet_status.as_str().into())?;
    Ok(())
}
