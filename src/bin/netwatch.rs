//! Network watch
//!
//! Starts network monitoring with HTTP probes, feeds it one synthetic
//! platform path, and logs every change to the published network keys.
//!
//! Usage:
//!   statewire-netwatch --active --interface wifi --duration-secs 60
//!
//! Environment Variables:
//!   RUST_LOG - tracing filter, overrides --log-level
//!   STATEWIRE_KV_ROOT - key-value root directory

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use statewire::network::{InterfaceType, PathAttributes};
use statewire::{ConnectivityEvent, HubConfig, KeyValueStore, KeyWatch, ListenerConfig, StateWire};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Interface {
    Wifi,
    Cellular,
    Wired,
}

impl From<Interface> for InterfaceType {
    fn from(value: Interface) -> Self {
        match value {
            Interface::Wifi => Self::Wifi,
            Interface::Cellular => Self::Cellular,
            Interface::Wired => Self::Wired,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "statewire-netwatch")]
#[command(about = "Watch internet quality as published by statewire")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "STATEWIRE_CONFIG")]
    config: Option<String>,

    /// Probe on every tick instead of only during offline recovery
    #[arg(long)]
    active: bool,

    /// Custom probe endpoint (repeatable)
    #[arg(long = "endpoint")]
    endpoints: Vec<String>,

    /// Interface reported in the synthetic platform path
    #[arg(long, value_enum, default_value = "wifi")]
    interface: Interface,

    /// Stop after this many seconds
    #[arg(long, default_value = "60")]
    duration_secs: u64,

    /// Minimum spacing between logged changes, in milliseconds
    #[arg(long, default_value = "500")]
    throttle_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path);
            HubConfig::from_json(&std::fs::read_to_string(path)?)?
        }
        None => HubConfig::default(),
    };
    let network_instance = config.network_instance.clone();

    let hub = StateWire::builder().config(config).build()?;
    info!(version = StateWire::version(), "statewire-netwatch starting");

    let stream = hub.add_listener(
        "netwatch",
        ListenerConfig::key_value(KeyWatch::default().in_instance(network_instance)).with_throttle_ms(args.throttle_ms),
    )?;

    if !args.endpoints.is_empty() {
        info!("Probing {} custom endpoints", args.endpoints.len());
        hub.set_ping_endpoints(args.endpoints.clone());
    }
    hub.set_active_ping_mode(args.active);
    hub.start_network_monitoring()?;

    let path = PathAttributes::satisfied(args.interface.into());
    if !hub.connectivity_feed().post(ConnectivityEvent::PathChanged(path)) {
        warn!("connectivity event was not accepted");
    }

    let store = hub.network_store();
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match stream.recv_timeout(remaining.min(Duration::from_secs(1))) {
            Ok(event) => log_keys(store.as_ref(), event.deferred),
            Err(e) if e.is_retryable() => {}
            Err(e) => return Err(e.into()),
        }
    }

    hub.stop_network_monitoring();
    log_keys(store.as_ref(), false);
    Ok(())
}

fn log_keys(store: &dyn KeyValueStore, deferred: bool) {
    let Ok(keys) = store.keys() else {
        warn!("network store unavailable");
        return;
    };
    let rendered: Vec<String> = keys
        .iter()
        .filter_map(|k| store.get(k).ok().map(|v| format!("{k}={v}")))
        .collect();
    info!(deferred, "{}", rendered.join(" "));
}
