//! Quality classification.
//!
//! Pure functions only: latency buckets, the type-based fallback estimate and
//! the combined verdict published as `NETWORK_QUALITY`.

use serde::{Deserialize, Serialize};

use super::state::{CellularGeneration, ConnectionType, NetworkState, NetworkStatus};

/// Upper bound (exclusive) of the excellent bucket, in milliseconds.
pub const EXCELLENT_BELOW_MS: f64 = 100.0;
/// Upper bound (exclusive) of the good bucket, in milliseconds.
pub const GOOD_BELOW_MS: f64 = 300.0;
/// Upper bound (exclusive) of the fair bucket, in milliseconds.
pub const FAIR_BELOW_MS: f64 = 1000.0;

/// Probe-only quality, derived from measured latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternetQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Offline,
    #[default]
    Unknown,
}

impl InternetQuality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

/// Combined verdict over link type and probe quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkQuality {
    Strong,
    Medium,
    Weak,
    Offline,
    #[default]
    Unknown,
}

impl LinkQuality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Medium => "medium",
            Self::Weak => "weak",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

/// Coarse internet state for hosts that only want one flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InternetStatus {
    Offline,
    Online,
    OnlineWeak,
}

impl InternetStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::OnlineWeak => "online-weak",
        }
    }
}

/// Bucket a round-trip latency.
///
/// Negative (and NaN) latencies mean "no measurement".
#[must_use]
pub fn classify_latency(latency_ms: f64) -> InternetQuality {
    if latency_ms.is_nan() || latency_ms < 0.0 {
        InternetQuality::Unknown
    } else if latency_ms < EXCELLENT_BELOW_MS {
        InternetQuality::Excellent
    } else if latency_ms < GOOD_BELOW_MS {
        InternetQuality::Good
    } else if latency_ms < FAIR_BELOW_MS {
        InternetQuality::Fair
    } else {
        InternetQuality::Poor
    }
}

/// Estimate from the link alone, used before any latency is known.
#[must_use]
pub fn type_based_quality(connection_type: ConnectionType, generation: CellularGeneration) -> LinkQuality {
    match connection_type {
        ConnectionType::Wifi | ConnectionType::Ethernet => LinkQuality::Strong,
        ConnectionType::Cellular => match generation {
            CellularGeneration::G4 | CellularGeneration::G5 => LinkQuality::Strong,
            CellularGeneration::G3 => LinkQuality::Medium,
            CellularGeneration::G2 | CellularGeneration::Unknown => LinkQuality::Weak,
        },
        _ => LinkQuality::Unknown,
    }
}

/// Combine the device snapshot with the probe verdict.
#[must_use]
pub fn combined_quality(network: &NetworkState, quality: InternetQuality, latency_ms: f64) -> LinkQuality {
    if !network.is_connected
        || network.status == NetworkStatus::Offline
        || network.connection_type == ConnectionType::None
        || quality == InternetQuality::Offline
    {
        return LinkQuality::Offline;
    }

    if quality == InternetQuality::Unknown || latency_ms < 0.0 {
        return type_based_quality(network.connection_type, network.cellular_generation);
    }

    match quality {
        InternetQuality::Excellent | InternetQuality::Good => LinkQuality::Strong,
        InternetQuality::Fair => LinkQuality::Medium,
        InternetQuality::Poor => LinkQuality::Weak,
        InternetQuality::Offline | InternetQuality::Unknown => LinkQuality::Unknown,
    }
}

/// `offline` unless reachable; weak when the probe is poor or fair, or the
/// combined verdict is weak.
#[must_use]
pub fn internet_status(reachable: bool, quality: InternetQuality, combined: LinkQuality) -> InternetStatus {
    if !reachable {
        return InternetStatus::Offline;
    }
    if matches!(quality, InternetQuality::Poor | InternetQuality::Fair) || combined == LinkQuality::Weak {
        InternetStatus::OnlineWeak
    } else {
        InternetStatus::Online
    }
}
