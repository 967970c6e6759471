//! # statewire - reactive state for embedded hosts
//!
//! statewire sits between an application and its storage engines. It keeps a
//! registry of named listeners that are told when watched state changes, and
//! a network monitor that turns platform connectivity signals and observed
//! request latency into one published internet-quality verdict.
//!
//! ## Core Concepts
//!
//! - **Listener**: a named observer of key-value keys or relational tables,
//!   with optional leading-edge throttling and pause/resume
//! - **ListenerStream**: where a listener's notifications arrive
//! - **NetworkMonitor**: active or passive internet-quality tracking with
//!   offline recovery checks
//! - **Publication keys**: `NETWORK_*` and `INTERNET_*` values written to the
//!   `network` key-value instance, watchable like any other key
//!
//! ## Usage
//!
//! ```rust,ignore
//! use statewire::{KeyWatch, ListenerConfig, StateWire};
//!
//! let hub = StateWire::new()?;
//! let stream = hub.add_listener(
//!     "connectivity",
//!     ListenerConfig::key_value(KeyWatch::keys(["INTERNET_STATE"]).in_instance("network"))
//!         .with_throttle_ms(1_000),
//! )?;
//!
//! hub.start_network_monitoring()?;
//! let event = stream.recv()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hub;
pub mod listener;
pub mod network;
pub mod storage;
pub mod value;

pub use config::{HubConfig, MonitorConfig};
pub use error::{ExecutionError, ListenerError, ProbeError, StorageError, WireError, WireResult};
pub use hub::{StateWire, StateWireBuilder, VERSION};
pub use listener::{
    ChangeEvent, ChangeSource, CombinedWatch, DispatchReport, KeyWatch, ListenerConfig, ListenerEvent, ListenerInfo,
    ListenerOptions, ListenerRegistry, ListenerStream, TableWatch,
};
pub use network::{
    ConnectionType, ConnectivityEvent, ConnectivityFeed, ConnectivityProvider, InternetQuality, InternetQualityState,
    InternetStatus, LinkQuality, NetworkMonitor, NetworkState, NetworkStatus, PathAttributes, Prober,
    ReachabilityFlags,
};
#[cfg(feature = "sqlite")]
pub use storage::SqlCatalog;
pub use storage::{ChangeObserver, KeyValueStore, KvEnvironment, MemoryKvStore};
pub use value::StoredValue;
