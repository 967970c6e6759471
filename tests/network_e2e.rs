use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use statewire::network::publish::{
    INTERNET_QUALITY, INTERNET_REACHABLE, INTERNET_STATE, IS_CONNECTED, NETWORK_QUALITY, NETWORK_TYPE,
};
use statewire::network::InterfaceType;
use statewire::{
    ConnectivityEvent, HubConfig, KeyValueStore, KeyWatch, ListenerConfig, PathAttributes, ProbeError, Prober,
    StateWire, StoredValue,
};

/// Records every endpoint it is asked to probe and answers with a fixed latency.
struct RecordingProber {
    latency: Duration,
    seen: Mutex<Vec<String>>,
}

impl RecordingProber {
    fn new(latency_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::from_millis(latency_ms),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Prober for RecordingProber {
    fn probe(&self, endpoint: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        self.seen.lock().unwrap().push(endpoint.to_string());
        Ok(self.latency)
    }
}

/// Blocks every probe until the gate opens.
struct GatedProber {
    open: AtomicBool,
    calls: Mutex<usize>,
}

impl Prober for GatedProber {
    fn probe(&self, endpoint: &str, timeout: Duration) -> Result<Duration, ProbeError> {
        *self.calls.lock().unwrap() += 1;
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.open.load(Ordering::SeqCst) {
            if Instant::now() > deadline {
                return Err(ProbeError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(Duration::from_millis(10))
    }
}

fn hub_with(prober: Arc<dyn Prober>, active_interval_ms: u64) -> (tempfile::TempDir, StateWire) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HubConfig {
        kv_root: Some(dir.path().to_path_buf()),
        ..HubConfig::default()
    };
    config.monitor.active_interval_ms = active_interval_ms;
    let hub = StateWire::builder().config(config).prober(prober).build().unwrap();
    (dir, hub)
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn key_is(store: &dyn KeyValueStore, key: &str, expected: impl Into<StoredValue>) -> bool {
    store.get(key).map(|v| v == expected.into()).unwrap_or(false)
}

fn wifi() -> ConnectivityEvent {
    ConnectivityEvent::PathChanged(PathAttributes::satisfied(InterfaceType::Wifi))
}

#[test]
fn disconnect_forces_offline_and_stops_probing() {
    let prober = RecordingProber::new(20);
    let (_dir, hub) = hub_with(prober.clone(), 20);
    let store = hub.network_store();

    hub.set_active_ping_mode(true);
    hub.start_network_monitoring().unwrap();
    assert!(hub.connectivity_feed().post(wifi()));
    assert!(wait_until(|| key_is(store.as_ref(), INTERNET_STATE, "online")));
    assert!(key_is(store.as_ref(), INTERNET_QUALITY, "excellent"));

    assert!(hub
        .connectivity_feed()
        .post(ConnectivityEvent::PathChanged(PathAttributes::unsatisfied())));
    assert!(wait_until(|| key_is(store.as_ref(), NETWORK_QUALITY, "offline")
        && key_is(store.as_ref(), INTERNET_REACHABLE, false)
        && key_is(store.as_ref(), INTERNET_STATE, "offline")));
    assert!(key_is(store.as_ref(), IS_CONNECTED, false));

    // Let any probe spawned before the disconnect land, then expect silence.
    thread::sleep(Duration::from_millis(60));
    let probes = prober.seen().len();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(prober.seen().len(), probes);

    let q = hub.internet_quality();
    assert!(!q.reachable);
    assert!(q.last_latency_ms < 0.0);
    hub.stop_network_monitoring();
}

#[test]
fn passive_wifi_publishes_link_estimate_while_probe_runs() {
    let prober = Arc::new(GatedProber {
        open: AtomicBool::new(false),
        calls: Mutex::new(0),
    });
    let (_dir, hub) = hub_with(prober.clone(), 10_000);
    let store = hub.network_store();

    hub.start_network_monitoring().unwrap();
    assert!(hub.connectivity_feed().post(wifi()));

    assert!(wait_until(|| *prober.calls.lock().unwrap() == 1));
    assert!(wait_until(|| key_is(store.as_ref(), NETWORK_QUALITY, "strong")));
    assert!(key_is(store.as_ref(), NETWORK_TYPE, "wifi"));
    assert!(key_is(store.as_ref(), INTERNET_QUALITY, "unknown"));
    assert!(key_is(store.as_ref(), INTERNET_STATE, "offline"));

    prober.open.store(true, Ordering::SeqCst);
    assert!(wait_until(|| key_is(store.as_ref(), INTERNET_STATE, "online")));
    assert!(key_is(store.as_ref(), INTERNET_QUALITY, "excellent"));
    assert!(key_is(store.as_ref(), INTERNET_REACHABLE, true));

    // Passive mode stops probing once reachability is verified.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(*prober.calls.lock().unwrap(), 1);
    hub.stop_network_monitoring();
}

#[test]
fn active_probes_rotate_and_reset_on_new_endpoints() {
    let prober = RecordingProber::new(5);
    let (_dir, hub) = hub_with(prober.clone(), 15);
    let custom: Vec<String> = (0..4).map(|i| format!("https://e{i}.test/")).collect();

    hub.set_ping_endpoints(custom.clone());
    hub.set_active_ping_mode(true);
    hub.start_network_monitoring().unwrap();
    assert!(hub.connectivity_feed().post(wifi()));

    assert!(wait_until(|| prober.seen().len() >= 5));
    let expected: Vec<String> = custom.iter().chain(custom.iter().take(1)).cloned().collect();
    assert_eq!(&prober.seen()[..5], expected.as_slice());

    hub.set_ping_endpoints(vec!["https://x0.test/".into(), "https://x1.test/".into()]);
    assert!(wait_until(|| prober.seen().iter().any(|e| e.starts_with("https://x"))));
    let first_new = prober.seen().into_iter().find(|e| e.starts_with("https://x")).unwrap();
    assert_eq!(first_new, "https://x0.test/");

    hub.stop_network_monitoring();
    assert!(!hub.is_network_monitoring_active());
}

#[test]
fn host_reports_drive_the_published_state() {
    let (_dir, hub) = hub_with(RecordingProber::new(1), 10_000);
    let state = hub
        .add_listener(
            "internet",
            ListenerConfig::key_value(KeyWatch::keys([INTERNET_STATE]).in_instance("network")),
        )
        .unwrap();

    hub.report_network_latency(-1.0);
    assert!(state.try_recv().unwrap().is_none());

    hub.report_network_latency(650.0);
    let ev = state.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(!ev.deferred);
    let store = hub.network_store();
    assert!(key_is(store.as_ref(), INTERNET_QUALITY, "fair"));
    assert!(key_is(store.as_ref(), INTERNET_STATE, "online-weak"));

    hub.report_network_failure();
    assert!(state.recv_timeout(Duration::from_secs(1)).is_ok());
    assert!(key_is(store.as_ref(), INTERNET_STATE, "offline"));
    assert!(hub.internet_quality().is_checking_offline_recovery);
}

#[test]
fn feed_is_closed_while_monitoring_is_stopped() {
    let (_dir, hub) = hub_with(RecordingProber::new(1), 10_000);
    let feed = hub.connectivity_feed();
    assert!(!feed.post(wifi()));
    assert_eq!(feed.dropped(), 1);

    hub.start_network_monitoring().unwrap();
    assert!(feed.post(wifi()));
    assert!(wait_until(|| hub.network_state().is_connected));
    hub.stop_network_monitoring();
    assert!(!feed.post(wifi()));
}
