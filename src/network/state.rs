//! Device-level connectivity snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Link status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl NetworkStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

/// Transport carrying the active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Bluetooth,
    Vpn,
    None,
    #[default]
    Unknown,
}

impl ConnectionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
            Self::Bluetooth => "bluetooth",
            Self::Vpn => "vpn",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }
}

/// Radio generation of a cellular link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellularGeneration {
    #[serde(rename = "2g")]
    G2,
    #[serde(rename = "3g")]
    G3,
    #[serde(rename = "4g")]
    G4,
    #[serde(rename = "5g")]
    G5,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl CellularGeneration {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::G2 => "2g",
            Self::G3 => "3g",
            Self::G4 => "4g",
            Self::G5 => "5g",
            Self::Unknown => "unknown",
        }
    }
}

/// The platform's own guess at internet reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReachabilityHint {
    #[default]
    Unknown,
    No,
    Yes,
}

impl ReachabilityHint {
    /// Integer form used by hosts: -1 unknown, 0 no, 1 yes.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Unknown => -1,
            Self::No => 0,
            Self::Yes => 1,
        }
    }

    #[must_use]
    pub const fn from_bool(reachable: bool) -> Self {
        if reachable {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Latest device connectivity snapshot. Replaced as a whole on every update.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub status: NetworkStatus,
    pub connection_type: ConnectionType,
    pub is_connected: bool,
    pub internet_reachable_hint: ReachabilityHint,
    /// Meaningful only when `connection_type` is cellular.
    pub cellular_generation: CellularGeneration,
    /// Signal strength, -1 when unavailable.
    pub wifi_strength: i32,
    pub is_expensive: bool,
    pub timestamp: DateTime<Utc>,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            status: NetworkStatus::Unknown,
            connection_type: ConnectionType::Unknown,
            is_connected: false,
            internet_reachable_hint: ReachabilityHint::Unknown,
            cellular_generation: CellularGeneration::Unknown,
            wifi_strength: -1,
            is_expensive: false,
            timestamp: Utc::now(),
        }
    }
}

impl NetworkState {
    #[must_use]
    pub fn is_cellular(&self) -> bool {
        self.connection_type == ConnectionType::Cellular
    }
}
