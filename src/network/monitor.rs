//! Network monitor worker.
//!
//! One background thread owns the evaluation timer and consumes three
//! channels: control messages from the public API, connectivity events from
//! the [`ConnectivityFeed`], and completions from probe threads. All state
//! lives in a [`MonitorCore`] behind one mutex; publication into the
//! key-value sink happens while that mutex is held so the store always sees
//! snapshots in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use crate::config::MonitorConfig;
use crate::error::{ExecutionError, ProbeError, WireResult};
use crate::storage::KeyValueStore;

use super::core::{Evaluation, InternetQualityState, MonitorCore, ProbeOutcome, ProbeTicket};
use super::endpoints::EndpointRotator;
use super::observer::{ConnectivityEvent, ConnectivityFeed, ConnectivityProvider};
use super::probe::Prober;
use super::publish::{publish_internet, publish_network, Publication};
use super::state::NetworkState;

#[derive(Debug)]
enum Control {
    /// Interval changed; optionally evaluate right away.
    Reschedule { evaluate_now: bool },
    Stop,
}

#[derive(Debug)]
struct ProbeDone {
    generation: u64,
    sequence: u64,
    endpoint: String,
    result: Result<Duration, ProbeError>,
}

struct Shared {
    core: Mutex<MonitorCore>,
    sink: Option<Arc<dyn KeyValueStore>>,
    prober: Arc<dyn Prober>,
    config: MonitorConfig,
    debug: AtomicBool,
}

impl Shared {
    // Core updates are plain field writes, so a poisoned lock still guards a
    // consistent value.
    fn lock(&self) -> MutexGuard<'_, MonitorCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn interval(&self) -> Duration {
        self.config.interval(self.lock().active_ping_mode())
    }

    fn publish(&self, publication: &Publication, network: bool, internet: bool) {
        let Some(sink) = &self.sink else {
            return;
        };
        if network {
            if let Err(e) = publish_network(sink.as_ref(), publication) {
                warn!(error = %e, "failed to publish network keys");
            }
        }
        if internet {
            if let Err(e) = publish_internet(sink.as_ref(), publication) {
                warn!(error = %e, "failed to publish internet keys");
            }
        }
        if internet && self.debug() {
            debug!(
                state = publication.internet_status.as_str(),
                reachable = publication.reachable,
                quality = publication.quality.as_str(),
                latency_ms = publication.latency_ms,
                "published internet state"
            );
        }
    }

    /// Replace the device snapshot and publish everything.
    fn apply_network(&self, state: NetworkState) -> MutexGuard<'_, MonitorCore> {
        let mut core = self.lock();
        if self.debug() {
            debug!(
                status = state.status.as_str(),
                connection_type = state.connection_type.as_str(),
                connected = state.is_connected,
                "network state updated"
            );
        }
        core.apply_network(state);
        self.publish(&core.publication(), true, true);
        core
    }

    fn evaluate(&self, core: &mut MonitorCore, probe_tx: &Sender<ProbeDone>) {
        match core.evaluate() {
            Evaluation::ForcedOffline => {
                self.publish(&core.publication(), false, true);
            }
            Evaluation::PassiveSteady => {
                if core.quality_state().last_latency_ms < 0.0 {
                    self.publish(&core.publication(), false, true);
                }
            }
            Evaluation::Probe(ticket) => {
                let sequence = ticket.sequence;
                if let Err(e) = self.spawn_probe(ticket, probe_tx.clone()) {
                    warn!(error = %e, "failed to start probe");
                    core.abandon_probe(sequence);
                }
            }
            Evaluation::ProbeInFlight => trace!("probe already in flight, skipping tick"),
            Evaluation::NoEndpoint => warn!("no probe endpoints configured"),
        }
    }

    fn spawn_probe(&self, ticket: ProbeTicket, done_tx: Sender<ProbeDone>) -> Result<(), ExecutionError> {
        let prober = Arc::clone(&self.prober);
        let timeout = self.config.probe_timeout();
        let name = "statewire-probe".to_string();

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = prober.probe(&ticket.endpoint, timeout);
                // The worker may be gone already; a dropped completion is fine.
                let _ = done_tx.send(ProbeDone {
                    generation: ticket.generation,
                    sequence: ticket.sequence,
                    endpoint: ticket.endpoint,
                    result,
                });
            })
            .map(drop)
            .map_err(|e| ExecutionError::Spawn {
                name,
                message: e.to_string(),
            })
    }

    fn finish_probe(&self, done: ProbeDone) {
        let mut core = self.lock();
        match core.complete_probe(done.generation, done.sequence, &done.result) {
            ProbeOutcome::Applied => {
                match &done.result {
                    Ok(elapsed) => {
                        if self.debug() {
                            debug!(endpoint = %done.endpoint, latency_ms = elapsed.as_secs_f64() * 1000.0, "probe succeeded");
                        }
                    }
                    Err(e) => warn!(endpoint = %done.endpoint, error = %e, "probe failed"),
                }
                self.publish(&core.publication(), false, true);
            }
            ProbeOutcome::Stale => trace!(endpoint = %done.endpoint, "discarding stale probe result"),
        }
    }
}

struct Worker {
    control_tx: Sender<Control>,
    join: JoinHandle<()>,
}

/// Tracks device connectivity and verified internet quality.
pub struct NetworkMonitor {
    shared: Arc<Shared>,
    feed: ConnectivityFeed,
    feed_rx: Receiver<ConnectivityEvent>,
    active: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
    provider: Option<Arc<dyn ConnectivityProvider>>,
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("active", &self.is_active())
            .field("has_sink", &self.shared.sink.is_some())
            .field("has_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl NetworkMonitor {
    pub fn new(
        config: MonitorConfig,
        sink: Option<Arc<dyn KeyValueStore>>,
        prober: Arc<dyn Prober>,
        provider: Option<Arc<dyn ConnectivityProvider>>,
    ) -> WireResult<Self> {
        config.validate()?;

        let (feed_tx, feed_rx) = bounded::<ConnectivityEvent>(config.connectivity_queue_capacity);
        let active = Arc::new(AtomicBool::new(false));
        let rotator = EndpointRotator::new(config.default_endpoints.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(MonitorCore::new(rotator)),
                sink,
                prober,
                config,
                debug: AtomicBool::new(false),
            }),
            feed: ConnectivityFeed::new(feed_tx, feed_rx.clone(), Arc::clone(&active)),
            feed_rx,
            active,
            worker: Mutex::new(None),
            provider,
        })
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the worker. Starting a running monitor is a no-op.
    ///
    /// The first evaluation runs immediately.
    pub fn start(&self) -> WireResult<()> {
        let mut slot = self.worker_slot();
        if slot.is_some() {
            return Ok(());
        }

        let generation = self.shared.lock().begin_generation();
        // Anything posted before this start belongs to no run.
        while self.feed_rx.try_recv().is_ok() {}

        let (control_tx, control_rx) = bounded::<Control>(16);
        let shared = Arc::clone(&self.shared);
        let feed_rx = self.feed_rx.clone();
        let name = "statewire-network".to_string();

        self.active.store(true, Ordering::Release);
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&shared, &control_rx, &feed_rx))
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                ExecutionError::Spawn {
                    name,
                    message: e.to_string(),
                }
            })?;

        *slot = Some(Worker { control_tx, join });
        info!(generation, "network monitoring started");
        Ok(())
    }

    /// Stop the worker and wait for it. In-flight probes become stale.
    pub fn stop(&self) {
        let Some(worker) = self.worker_slot().take() else {
            return;
        };

        self.active.store(false, Ordering::Release);
        let generation = self.shared.lock().begin_generation();
        let _ = worker.control_tx.send(Control::Stop);
        if worker.join.join().is_err() {
            warn!("network worker panicked");
        }
        info!(generation, "network monitoring stopped");
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Handle for posting platform connectivity events.
    #[must_use]
    pub fn feed(&self) -> ConnectivityFeed {
        self.feed.clone()
    }

    #[must_use]
    pub fn network_state(&self) -> NetworkState {
        self.shared.lock().network().clone()
    }

    #[must_use]
    pub fn quality_state(&self) -> InternetQualityState {
        self.shared.lock().quality_state()
    }

    /// Current publication snapshot, whether or not a sink is attached.
    #[must_use]
    pub fn publication(&self) -> Publication {
        self.shared.lock().publication()
    }

    /// Pull a fresh snapshot from the connectivity provider.
    ///
    /// While monitoring runs the snapshot goes through the feed like any
    /// platform event. Otherwise it is applied and published directly without
    /// probing. Returns whether the provider had a snapshot.
    pub fn refresh(&self) -> bool {
        let Some(flags) = self.provider.as_ref().and_then(|p| p.reachability_flags()) else {
            return false;
        };
        let event = ConnectivityEvent::ReachabilityChanged(flags);
        if !self.is_active() || !self.feed.post(event.clone()) {
            drop(self.shared.apply_network(event.to_network_state()));
        }
        true
    }

    /// Switch between active pinging (10 s) and passive observation (30 s).
    ///
    /// Enabling while monitoring runs evaluates immediately.
    pub fn set_active_ping_mode(&self, enabled: bool) {
        self.shared.lock().set_active_ping_mode(enabled);
        if self.shared.debug() {
            debug!(enabled, "active ping mode changed");
        }
        if let Some(worker) = self.worker_slot().as_ref() {
            let _ = worker.control_tx.try_send(Control::Reschedule { evaluate_now: enabled });
        }
    }

    /// Feed in the latency of a successful request made by the host.
    ///
    /// Negative values are ignored.
    pub fn report_latency(&self, latency_ms: f64) {
        let mut core = self.shared.lock();
        if core.report_latency(latency_ms) {
            self.shared.publish(&core.publication(), false, true);
        }
    }

    /// Feed in a failed request made by the host. Arms offline recovery.
    pub fn report_failure(&self) {
        let mut core = self.shared.lock();
        core.report_failure();
        if self.shared.debug() {
            debug!("network failure reported, offline recovery armed");
        }
        self.shared.publish(&core.publication(), false, true);
    }

    /// Replace the custom probe endpoints. An empty list restores the defaults.
    pub fn set_ping_endpoints(&self, endpoints: Vec<String>) {
        self.shared.lock().set_endpoints(endpoints);
    }

    pub fn set_debug(&self, enabled: bool) {
        self.shared.debug.store(enabled, Ordering::Relaxed);
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        // The worker only holds receivers and an Arc of shared state, so
        // joining here cannot wait on ourselves.
        self.stop();
    }
}

fn worker_loop(shared: &Shared, control_rx: &Receiver<Control>, feed_rx: &Receiver<ConnectivityEvent>) {
    // Probe threads report here; the worker keeps a sender so the channel
    // never disconnects under it.
    let (probe_tx, probe_rx) = bounded::<ProbeDone>(4);
    let mut next_tick = Instant::now();

    loop {
        let now = Instant::now();
        if now >= next_tick {
            let mut core = shared.lock();
            shared.evaluate(&mut core, &probe_tx);
            let interval = shared.config.interval(core.active_ping_mode());
            drop(core);
            next_tick = now + interval;
        }
        let wait = next_tick.saturating_duration_since(Instant::now());

        select! {
            recv(control_rx) -> msg => match msg {
                Ok(Control::Reschedule { evaluate_now }) => {
                    next_tick = if evaluate_now {
                        Instant::now()
                    } else {
                        Instant::now() + shared.interval()
                    };
                }
                Ok(Control::Stop) | Err(_) => break,
            },
            recv(feed_rx) -> msg => {
                if let Ok(event) = msg {
                    let mut core = shared.apply_network(event.to_network_state());
                    shared.evaluate(&mut core, &probe_tx);
                }
            }
            recv(probe_rx) -> msg => {
                if let Ok(done) = msg {
                    shared.finish_probe(done);
                }
            }
            default(wait) => {}
        }
    }
}
