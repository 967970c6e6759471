//! Network and internet-quality tracking.
//!
//! Platform connectivity signals arrive as [`ConnectivityEvent`]s, host
//! traffic reports latency or failure, and optional active probes measure
//! round trips. The [`NetworkMonitor`] folds all of it into one verdict and
//! publishes it as plain keys in a key-value instance, where listeners can
//! watch it like any other state.

/// Pure state machine.
pub mod core;
/// Probe endpoint rotation.
pub mod endpoints;
/// Background worker and public monitor handle.
pub mod monitor;
/// Platform connectivity messages.
pub mod observer;
/// Probe implementations.
pub mod probe;
/// Publication keys and writers.
pub mod publish;
/// Quality classification.
pub mod quality;
/// Device connectivity snapshot.
pub mod state;

pub use self::core::{Evaluation, InternetQualityState, MonitorCore, ProbeOutcome, ProbeTicket};
pub use endpoints::{EndpointRotator, DEFAULT_ENDPOINTS};
pub use monitor::NetworkMonitor;
pub use observer::{
    ConnectivityEvent, ConnectivityFeed, ConnectivityProvider, InterfaceType, PathAttributes, PathStatus,
    ReachabilityFlags,
};
#[cfg(feature = "http-probe")]
pub use probe::HttpProber;
pub use probe::{Prober, UnavailableProber};
pub use publish::{Publication, NETWORK_INSTANCE};
pub use quality::{classify_latency, combined_quality, InternetQuality, InternetStatus, LinkQuality};
pub use state::{CellularGeneration, ConnectionType, NetworkState, NetworkStatus, ReachabilityHint};
