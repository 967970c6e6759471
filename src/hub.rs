//! The public façade.
//!
//! [`StateWire`] owns the listener registry, the storage collaborators and
//! the network monitor, and wires them together: every store reports writes
//! to the registry, and the monitor publishes into the network instance of
//! the key-value environment.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::error::{ExecutionError, WireResult};
use crate::listener::{ChangeEvent, DispatchReport, ListenerConfig, ListenerInfo, ListenerRegistry, ListenerStream};
use crate::network::{
    ConnectivityFeed, ConnectivityProvider, InternetQualityState, NetworkMonitor, NetworkState, Prober,
};
#[cfg(feature = "sqlite")]
use crate::storage::SqlCatalog;
use crate::storage::{KeyValueStore, KvEnvironment, MemoryKvStore};

/// Crate version reported to hosts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builder for [`StateWire`].
#[derive(Default)]
pub struct StateWireBuilder {
    config: HubConfig,
    prober: Option<Arc<dyn Prober>>,
    provider: Option<Arc<dyn ConnectivityProvider>>,
}

impl StateWireBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the probe implementation (defaults to HTTP `HEAD` probes).
    #[must_use]
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    #[must_use]
    pub fn connectivity_provider(mut self, provider: Arc<dyn ConnectivityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> WireResult<StateWire> {
        let config = self.config;
        config.validate()?;

        let registry = Arc::new(ListenerRegistry::new(config.max_listeners, config.stream_capacity));
        registry.configure(Some(config.debug), None);

        let kv = KvEnvironment::new().with_observer(Arc::clone(&registry) as _);
        if let Some(root) = &config.kv_root {
            kv.set_root_path(root)?;
        }
        let network_store = kv.initialize_instance(Some(&config.network_instance))?;

        #[cfg(feature = "sqlite")]
        let sql = SqlCatalog::new().with_observer(Arc::clone(&registry) as _);

        let prober = match self.prober {
            Some(prober) => prober,
            None => default_prober()?,
        };
        let monitor = NetworkMonitor::new(
            config.monitor.clone(),
            Some(Arc::clone(&network_store) as Arc<dyn KeyValueStore>),
            prober,
            self.provider,
        )?;
        monitor.set_debug(config.debug);

        let sweeper = Sweeper::start(Arc::clone(&registry), &config)?;
        debug!(version = VERSION, "statewire ready");

        Ok(StateWire {
            registry,
            kv,
            network_store,
            #[cfg(feature = "sqlite")]
            sql,
            monitor,
            sweeper: Some(sweeper),
        })
    }
}

#[cfg(feature = "http-probe")]
fn default_prober() -> WireResult<Arc<dyn Prober>> {
    Ok(Arc::new(crate::network::HttpProber::new()?))
}

#[cfg(not(feature = "http-probe"))]
fn default_prober() -> WireResult<Arc<dyn Prober>> {
    Ok(Arc::new(crate::network::UnavailableProber))
}

/// Background thread delivering owed throttled notifications.
struct Sweeper {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl Sweeper {
    fn start(registry: Arc<ListenerRegistry>, config: &HubConfig) -> WireResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(config.flush_interval());
        let name = "statewire-sweeper".to_string();

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        registry.flush_pending(Utc::now());
                    }
                }
            })
            .map_err(|e| ExecutionError::Spawn {
                name,
                message: e.to_string(),
            })?;

        Ok(Self { stop_tx, join })
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.join();
    }
}

/// Reactive state hub: throttled listeners over the stores, plus network and
/// internet-quality tracking.
pub struct StateWire {
    registry: Arc<ListenerRegistry>,
    kv: KvEnvironment,
    network_store: Arc<MemoryKvStore>,
    #[cfg(feature = "sqlite")]
    sql: SqlCatalog,
    monitor: NetworkMonitor,
    sweeper: Option<Sweeper>,
}

impl std::fmt::Debug for StateWire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateWire")
            .field("listeners", &self.registry.len())
            .field("kv", &self.kv)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl StateWire {
    /// Build with default configuration.
    pub fn new() -> WireResult<Self> {
        StateWireBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> StateWireBuilder {
        StateWireBuilder::new()
    }

    #[must_use]
    pub const fn version() -> &'static str {
        VERSION
    }

    // Listeners

    pub fn add_listener(&self, id: impl Into<String>, config: ListenerConfig) -> WireResult<ListenerStream> {
        Ok(self.registry.add_listener(id, config)?)
    }

    pub fn remove_listener(&self, id: &str) -> WireResult<()> {
        Ok(self.registry.remove_listener(id)?)
    }

    pub fn remove_all_listeners(&self) -> usize {
        self.registry.remove_all_listeners()
    }

    #[must_use]
    pub fn has_listener(&self, id: &str) -> bool {
        self.registry.has_listener(id)
    }

    #[must_use]
    pub fn listener_ids(&self) -> Vec<String> {
        self.registry.listener_ids()
    }

    #[must_use]
    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.registry.listeners()
    }

    #[must_use]
    pub fn listener(&self, id: &str) -> Option<ListenerInfo> {
        self.registry.listener(id)
    }

    pub fn pause_listener(&self, id: &str) -> WireResult<()> {
        Ok(self.registry.pause_listener(id)?)
    }

    pub fn resume_listener(&self, id: &str) -> WireResult<()> {
        Ok(self.registry.resume_listener(id)?)
    }

    /// Route a change that happened outside the built-in stores.
    pub fn notify(&self, event: &ChangeEvent) -> DispatchReport {
        self.registry.dispatch(event, Utc::now())
    }

    #[must_use]
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    // Settings

    /// Update debug logging and the listener cap. `None` leaves a setting as is.
    pub fn configure(&self, debug: Option<bool>, max_listeners: Option<usize>) {
        self.registry.configure(debug, max_listeners);
        if let Some(debug) = debug {
            self.monitor.set_debug(debug);
        }
    }

    #[must_use]
    pub fn is_debug_mode(&self) -> bool {
        self.registry.is_debug()
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.configure(Some(enabled), None);
    }

    // Storage

    #[must_use]
    pub fn kv_environment(&self) -> &KvEnvironment {
        &self.kv
    }

    /// Instance the network monitor publishes into.
    #[must_use]
    pub fn network_store(&self) -> Arc<MemoryKvStore> {
        Arc::clone(&self.network_store)
    }

    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sql(&self) -> &SqlCatalog {
        &self.sql
    }

    // Network

    pub fn start_network_monitoring(&self) -> WireResult<()> {
        self.monitor.start()
    }

    pub fn stop_network_monitoring(&self) {
        self.monitor.stop();
    }

    #[must_use]
    pub fn is_network_monitoring_active(&self) -> bool {
        self.monitor.is_active()
    }

    #[must_use]
    pub fn network_state(&self) -> NetworkState {
        self.monitor.network_state()
    }

    #[must_use]
    pub fn internet_quality(&self) -> InternetQualityState {
        self.monitor.quality_state()
    }

    /// Ask the connectivity provider for a fresh snapshot.
    pub fn refresh_network_state(&self) -> bool {
        self.monitor.refresh()
    }

    pub fn set_active_ping_mode(&self, enabled: bool) {
        self.monitor.set_active_ping_mode(enabled);
    }

    pub fn report_network_latency(&self, latency_ms: f64) {
        self.monitor.report_latency(latency_ms);
    }

    pub fn report_network_failure(&self) {
        self.monitor.report_failure();
    }

    pub fn set_ping_endpoints(&self, endpoints: Vec<String>) {
        self.monitor.set_ping_endpoints(endpoints);
    }

    /// Handle platform glue uses to post connectivity events.
    #[must_use]
    pub fn connectivity_feed(&self) -> ConnectivityFeed {
        self.monitor.feed()
    }
}

impl Drop for StateWire {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
        }
        if self.monitor.is_active() {
            info!("stopping network monitoring on shutdown");
        }
        self.monitor.stop();
    }
}
