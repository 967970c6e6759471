//! Platform connectivity messages.
//!
//! Platform callbacks never touch monitor state directly. They build an
//! immutable [`ConnectivityEvent`] and post it through a [`ConnectivityFeed`];
//! the monitor worker converts it into a fresh [`NetworkState`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::state::{CellularGeneration, ConnectionType, NetworkState, NetworkStatus, ReachabilityHint};

/// Path evaluation result from a path-monitoring API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    /// Usable now.
    Satisfied,
    /// Usable once a connection is brought up on demand.
    Satisfiable,
    Unsatisfied,
    Unknown,
}

impl PathStatus {
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Satisfied | Self::Satisfiable)
    }
}

/// Interface the path runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Wifi,
    Cellular,
    Wired,
    Bluetooth,
    Vpn,
    Other,
}

/// Attributes of the current network path.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAttributes {
    pub status: PathStatus,
    pub interface: Option<InterfaceType>,
    pub is_expensive: bool,
    /// Radio generation when the path is cellular and the platform knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellular_generation: Option<CellularGeneration>,
}

impl PathAttributes {
    #[must_use]
    pub fn satisfied(interface: InterfaceType) -> Self {
        Self {
            status: PathStatus::Satisfied,
            interface: Some(interface),
            is_expensive: false,
            cellular_generation: None,
        }
    }

    #[must_use]
    pub fn unsatisfied() -> Self {
        Self {
            status: PathStatus::Unsatisfied,
            interface: None,
            is_expensive: false,
            cellular_generation: None,
        }
    }

    #[must_use]
    pub fn with_generation(mut self, generation: CellularGeneration) -> Self {
        self.cellular_generation = Some(generation);
        self
    }

    #[must_use]
    pub fn expensive(mut self, is_expensive: bool) -> Self {
        self.is_expensive = is_expensive;
        self
    }

    /// Convert into a device snapshot.
    #[must_use]
    pub fn to_network_state(&self) -> NetworkState {
        let is_connected = self.status.is_usable();

        let connection_type = match self.interface {
            Some(InterfaceType::Wifi) => ConnectionType::Wifi,
            Some(InterfaceType::Cellular) => ConnectionType::Cellular,
            Some(InterfaceType::Wired) => ConnectionType::Ethernet,
            Some(InterfaceType::Bluetooth) => ConnectionType::Bluetooth,
            Some(InterfaceType::Vpn) => ConnectionType::Vpn,
            Some(InterfaceType::Other) | None if !is_connected => ConnectionType::None,
            Some(InterfaceType::Other) | None => ConnectionType::Unknown,
        };

        let status = match self.status {
            PathStatus::Satisfied => NetworkStatus::Online,
            PathStatus::Unsatisfied => NetworkStatus::Offline,
            PathStatus::Satisfiable | PathStatus::Unknown => NetworkStatus::Unknown,
        };

        NetworkState {
            status,
            connection_type,
            is_connected,
            internet_reachable_hint: ReachabilityHint::from_bool(is_connected),
            cellular_generation: cellular_generation(connection_type, self.cellular_generation),
            wifi_strength: -1,
            is_expensive: self.is_expensive,
            timestamp: Utc::now(),
        }
    }
}

/// Legacy reachability flags.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReachabilityFlags {
    pub reachable: bool,
    pub connection_required: bool,
    /// Traffic goes over a wide-area (cellular) interface.
    pub is_wwan: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellular_generation: Option<CellularGeneration>,
}

impl ReachabilityFlags {
    /// Convert into a device snapshot.
    #[must_use]
    pub fn to_network_state(&self) -> NetworkState {
        let is_connected = self.reachable && !self.connection_required;
        let connection_type = if !is_connected {
            ConnectionType::None
        } else if self.is_wwan {
            ConnectionType::Cellular
        } else {
            ConnectionType::Wifi
        };

        NetworkState {
            status: if is_connected {
                NetworkStatus::Online
            } else {
                NetworkStatus::Offline
            },
            connection_type,
            is_connected,
            internet_reachable_hint: ReachabilityHint::from_bool(is_connected),
            cellular_generation: cellular_generation(connection_type, self.cellular_generation),
            wifi_strength: -1,
            is_expensive: self.is_wwan,
            timestamp: Utc::now(),
        }
    }
}

fn cellular_generation(
    connection_type: ConnectionType,
    reported: Option<CellularGeneration>,
) -> CellularGeneration {
    if connection_type == ConnectionType::Cellular {
        reported.unwrap_or_default()
    } else {
        CellularGeneration::Unknown
    }
}

/// A connectivity change reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "attributes", rename_all = "snake_case")]
pub enum ConnectivityEvent {
    PathChanged(PathAttributes),
    ReachabilityChanged(ReachabilityFlags),
}

impl ConnectivityEvent {
    #[must_use]
    pub fn to_network_state(&self) -> NetworkState {
        match self {
            Self::PathChanged(attrs) => attrs.to_network_state(),
            Self::ReachabilityChanged(flags) => flags.to_network_state(),
        }
    }
}

/// Source of on-demand connectivity snapshots, used by explicit refreshes.
pub trait ConnectivityProvider: Send + Sync {
    /// Current reachability, or `None` if the platform can not tell right now.
    fn reachability_flags(&self) -> Option<ReachabilityFlags>;
}

/// Cloneable posting handle into the monitor worker.
#[derive(Debug, Clone)]
pub struct ConnectivityFeed {
    tx: Sender<ConnectivityEvent>,
    /// Used only to evict the oldest queued event when the queue is full.
    rx: Receiver<ConnectivityEvent>,
    active: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl ConnectivityFeed {
    pub(crate) fn new(tx: Sender<ConnectivityEvent>, rx: Receiver<ConnectivityEvent>, active: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            rx,
            active,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Post an event without blocking.
    ///
    /// Every event is a full snapshot, so when the queue is full the oldest
    /// queued event is evicted to make room. Returns `false` when monitoring
    /// is not running and the event was discarded.
    pub fn post(&self, event: ConnectivityEvent) -> bool {
        if !self.active.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("connectivity queue full, evicted oldest event");
                    }
                    event = back;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
        }
    }

    /// Events discarded since this feed was created.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_wifi_path_is_online() {
        let s = PathAttributes::satisfied(InterfaceType::Wifi).to_network_state();
        assert_eq!(s.status, NetworkStatus::Online);
        assert_eq!(s.connection_type, ConnectionType::Wifi);
        assert!(s.is_connected);
        assert_eq!(s.internet_reachable_hint, ReachabilityHint::Yes);
        assert_eq!(s.cellular_generation, CellularGeneration::Unknown);
    }

    #[test]
    fn satisfiable_counts_as_connected_with_unknown_status() {
        let attrs = PathAttributes {
            status: PathStatus::Satisfiable,
            ..PathAttributes::satisfied(InterfaceType::Cellular).with_generation(CellularGeneration::G4)
        };
        let s = attrs.to_network_state();
        assert!(s.is_connected);
        assert_eq!(s.status, NetworkStatus::Unknown);
        assert_eq!(s.cellular_generation, CellularGeneration::G4);
    }

    #[test]
    fn generation_is_ignored_off_cellular() {
        let s = PathAttributes::satisfied(InterfaceType::Wired)
            .with_generation(CellularGeneration::G5)
            .to_network_state();
        assert_eq!(s.connection_type, ConnectionType::Ethernet);
        assert_eq!(s.cellular_generation, CellularGeneration::Unknown);
    }

    #[test]
    fn unsatisfied_path_without_interface_is_none() {
        let s = PathAttributes::unsatisfied().to_network_state();
        assert_eq!(s.status, NetworkStatus::Offline);
        assert_eq!(s.connection_type, ConnectionType::None);
        assert!(!s.is_connected);
        assert_eq!(s.internet_reachable_hint, ReachabilityHint::No);
    }

    #[test]
    fn reachability_flags_mapping() {
        let wifi = ReachabilityFlags {
            reachable: true,
            ..ReachabilityFlags::default()
        };
        assert_eq!(wifi.to_network_state().connection_type, ConnectionType::Wifi);

        let wwan = ReachabilityFlags {
            reachable: true,
            is_wwan: true,
            cellular_generation: Some(CellularGeneration::G3),
            ..ReachabilityFlags::default()
        };
        let s = wwan.to_network_state();
        assert_eq!(s.connection_type, ConnectionType::Cellular);
        assert_eq!(s.cellular_generation, CellularGeneration::G3);
        assert!(s.is_expensive);

        let needs_connection = ReachabilityFlags {
            reachable: true,
            connection_required: true,
            ..ReachabilityFlags::default()
        };
        let s = needs_connection.to_network_state();
        assert!(!s.is_connected);
        assert_eq!(s.status, NetworkStatus::Offline);
        assert_eq!(s.connection_type, ConnectionType::None);
    }

    #[test]
    fn inactive_feed_discards() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let active = Arc::new(AtomicBool::new(false));
        let feed = ConnectivityFeed::new(tx, rx.clone(), Arc::clone(&active));

        assert!(!feed.post(ConnectivityEvent::PathChanged(PathAttributes::unsatisfied())));
        assert_eq!(feed.dropped(), 1);
        assert!(rx.is_empty());
    }

    #[test]
    fn full_feed_keeps_the_latest_snapshot() {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let feed = ConnectivityFeed::new(tx, rx.clone(), Arc::new(AtomicBool::new(true)));

        let wifi = ConnectivityEvent::PathChanged(PathAttributes::satisfied(InterfaceType::Wifi));
        let cellular = ConnectivityEvent::PathChanged(PathAttributes::satisfied(InterfaceType::Cellular));
        let down = ConnectivityEvent::PathChanged(PathAttributes::unsatisfied());

        assert!(feed.post(wifi));
        assert!(feed.post(cellular.clone()));
        assert!(feed.post(down.clone()));
        assert_eq!(feed.dropped(), 1);

        let queued: Vec<ConnectivityEvent> = rx.try_iter().collect();
        assert_eq!(queued, vec![cellular, down]);
    }
}
