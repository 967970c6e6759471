//! Internet quality state machine.
//!
//! [`MonitorCore`] holds every piece of monitor state and makes every
//! decision, but performs no I/O: evaluation returns a [`ProbeTicket`] when a
//! probe should run, and the caller reports the result back with
//! [`MonitorCore::complete_probe`]. The worker in `monitor` owns threads,
//! timers and publication.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

use super::endpoints::EndpointRotator;
use super::publish::Publication;
use super::quality::{classify_latency, combined_quality, internet_status, InternetQuality, LinkQuality};
use super::state::NetworkState;

/// Copy-out view of the quality side of the monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternetQualityState {
    /// Last measured or reported latency, -1 when unknown.
    pub last_latency_ms: f64,
    pub quality: InternetQuality,
    pub reachable: bool,
    pub active_ping_mode: bool,
    pub is_checking_offline_recovery: bool,
    pub endpoint_index: usize,
    pub custom_endpoints: Vec<String>,
}

/// A probe the caller should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTicket {
    pub endpoint: String,
    /// Monitoring generation the probe belongs to.
    pub generation: u64,
    pub sequence: u64,
}

/// What an evaluation tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Link is down; state forced to offline, nothing to probe.
    ForcedOffline,
    /// Passive mode with verified reachability; probing skipped.
    PassiveSteady,
    /// Run this probe and report back.
    Probe(ProbeTicket),
    /// A probe is already outstanding; this tick is skipped.
    ProbeInFlight,
    /// No endpoint configured.
    NoEndpoint,
}

/// How a probe completion was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Applied,
    /// Belongs to an older generation, or the link dropped while it ran.
    Stale,
}

/// Pure monitor state.
#[derive(Debug, Clone)]
pub struct MonitorCore {
    network: NetworkState,
    last_latency_ms: f64,
    quality: InternetQuality,
    reachable: bool,
    active_ping_mode: bool,
    /// Unreachable with a recovery probe outstanding or due.
    checking_recovery: bool,
    /// The offline verdict came only from the link being down.
    offline_from_link: bool,
    rotator: EndpointRotator,
    generation: u64,
    next_sequence: u64,
    in_flight: Option<u64>,
}

impl Default for MonitorCore {
    fn default() -> Self {
        Self::new(EndpointRotator::default())
    }
}

impl MonitorCore {
    #[must_use]
    pub fn new(rotator: EndpointRotator) -> Self {
        Self {
            network: NetworkState::default(),
            last_latency_ms: -1.0,
            quality: InternetQuality::Unknown,
            reachable: false,
            active_ping_mode: false,
            checking_recovery: true,
            offline_from_link: false,
            rotator,
            generation: 0,
            next_sequence: 0,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn network(&self) -> &NetworkState {
        &self.network
    }

    /// Replace the device snapshot.
    ///
    /// Losing the link abandons any outstanding probe, so its late result is
    /// stale. When the link comes back, an offline verdict that only came
    /// from the link being down is cleared to unknown. A verdict from a failed
    /// probe or a reported failure stays until the next recovery check.
    pub fn apply_network(&mut self, state: NetworkState) {
        let link_lost = self.network.is_connected && !state.is_connected;
        let link_restored = !self.network.is_connected && state.is_connected;
        self.network = state;
        if link_lost {
            self.in_flight = None;
        }
        if link_restored && self.quality == InternetQuality::Offline && self.offline_from_link {
            self.quality = InternetQuality::Unknown;
            self.last_latency_ms = -1.0;
            self.offline_from_link = false;
        }
    }

    /// Unreachable; a recovery probe is now due.
    fn mark_offline(&mut self) {
        self.last_latency_ms = -1.0;
        self.quality = InternetQuality::Offline;
        self.reachable = false;
        self.checking_recovery = true;
    }

    fn mark_reachable(&mut self, latency_ms: f64) {
        self.last_latency_ms = latency_ms;
        self.quality = classify_latency(latency_ms);
        self.reachable = true;
        self.checking_recovery = false;
        self.offline_from_link = false;
    }

    /// Decide what this tick does.
    pub fn evaluate(&mut self) -> Evaluation {
        if !self.network.is_connected {
            // A failure verdict already in place keeps its origin.
            if self.quality != InternetQuality::Offline {
                self.offline_from_link = true;
            }
            self.in_flight = None;
            self.mark_offline();
            return Evaluation::ForcedOffline;
        }

        if !self.reachable {
            self.checking_recovery = true;
        }
        if !self.active_ping_mode && !self.checking_recovery {
            if self.last_latency_ms < 0.0 {
                self.quality = InternetQuality::Unknown;
            }
            return Evaluation::PassiveSteady;
        }

        if self.in_flight.is_some() {
            return Evaluation::ProbeInFlight;
        }

        let Some(endpoint) = self.rotator.next() else {
            return Evaluation::NoEndpoint;
        };
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.in_flight = Some(sequence);

        Evaluation::Probe(ProbeTicket {
            endpoint,
            generation: self.generation,
            sequence,
        })
    }

    /// Fold a probe result into the state.
    pub fn complete_probe(
        &mut self,
        generation: u64,
        sequence: u64,
        result: &Result<Duration, ProbeError>,
    ) -> ProbeOutcome {
        if generation != self.generation || self.in_flight != Some(sequence) {
            return ProbeOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(elapsed) => self.mark_reachable(elapsed.as_secs_f64() * 1000.0),
            Err(_) => {
                self.mark_offline();
                self.offline_from_link = false;
            }
        }
        ProbeOutcome::Applied
    }

    /// Release the outstanding probe slot without applying a result.
    pub fn abandon_probe(&mut self, sequence: u64) {
        if self.in_flight == Some(sequence) {
            self.in_flight = None;
        }
    }

    /// Record a latency sample from the host's own traffic.
    ///
    /// Negative samples are ignored; returns whether the sample was applied.
    pub fn report_latency(&mut self, latency_ms: f64) -> bool {
        if latency_ms.is_nan() || latency_ms < 0.0 {
            return false;
        }
        self.mark_reachable(latency_ms);
        true
    }

    /// Record a failed request from the host's own traffic.
    pub fn report_failure(&mut self) {
        self.mark_offline();
        self.offline_from_link = false;
    }

    pub fn set_active_ping_mode(&mut self, enabled: bool) {
        self.active_ping_mode = enabled;
    }

    #[must_use]
    pub const fn active_ping_mode(&self) -> bool {
        self.active_ping_mode
    }

    /// Replace the custom endpoint list. Empty restores the defaults.
    pub fn set_endpoints(&mut self, endpoints: Vec<String>) {
        self.rotator.set_custom(endpoints);
    }

    /// Start a new monitoring generation. Outstanding probes become stale.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = None;
        self.generation
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn probe_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn combined(&self) -> LinkQuality {
        combined_quality(&self.network, self.quality, self.last_latency_ms)
    }

    #[must_use]
    pub fn quality_state(&self) -> InternetQualityState {
        InternetQualityState {
            last_latency_ms: self.last_latency_ms,
            quality: self.quality,
            reachable: self.reachable,
            active_ping_mode: self.active_ping_mode,
            is_checking_offline_recovery: self.checking_recovery,
            endpoint_index: self.rotator.index(),
            custom_endpoints: self.rotator.custom().to_vec(),
        }
    }

    /// Everything the publication sink writes, computed in one place.
    #[must_use]
    pub fn publication(&self) -> Publication {
        let combined = self.combined();
        Publication {
            network: self.network.clone(),
            combined,
            quality: self.quality,
            latency_ms: self.last_latency_ms,
            reachable: self.reachable,
            internet_status: internet_status(self.reachable, self.quality, combined),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::observer::{InterfaceType, PathAttributes};
    use crate::network::quality::InternetStatus;

    fn wifi_core() -> MonitorCore {
        let mut core = MonitorCore::default();
        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());
        core
    }

    fn ticket(eval: Evaluation) -> ProbeTicket {
        match eval {
            Evaluation::Probe(t) => t,
            other => panic!("expected probe, got {other:?}"),
        }
    }

    #[test]
    fn disconnected_forces_offline_without_probe() {
        let mut core = MonitorCore::default();
        core.report_latency(50.0);
        assert_eq!(core.evaluate(), Evaluation::ForcedOffline);

        let q = core.quality_state();
        assert_eq!(q.quality, InternetQuality::Offline);
        assert!(!q.reachable);
        assert!(q.last_latency_ms < 0.0);
        assert!(!core.probe_in_flight());
    }

    #[test]
    fn link_restore_clears_forced_offline_only() {
        let mut core = MonitorCore::default();
        assert_eq!(core.evaluate(), Evaluation::ForcedOffline);
        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());
        assert_eq!(core.quality_state().quality, InternetQuality::Unknown);
        assert_eq!(core.combined(), LinkQuality::Strong);

        core.report_failure();
        core.apply_network(PathAttributes::unsatisfied().to_network_state());
        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());
        assert_eq!(core.quality_state().quality, InternetQuality::Offline);
    }

    #[test]
    fn passive_mode_probes_until_reachability_is_verified() {
        let mut core = wifi_core();
        let t = ticket(core.evaluate());
        assert_eq!(
            core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(40))),
            ProbeOutcome::Applied
        );
        assert!(core.quality_state().reachable);
        assert_eq!(core.evaluate(), Evaluation::PassiveSteady);
    }

    #[test]
    fn passive_steady_without_sample_reports_unknown() {
        let mut core = wifi_core();
        let t = ticket(core.evaluate());
        core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(40)));
        core.last_latency_ms = -1.0;
        assert_eq!(core.evaluate(), Evaluation::PassiveSteady);
        assert_eq!(core.quality_state().quality, InternetQuality::Unknown);
        assert_eq!(core.combined(), LinkQuality::Strong);
    }

    #[test]
    fn failed_probe_keeps_recovery_armed() {
        let mut core = wifi_core();
        let t = ticket(core.evaluate());
        let err = Err(ProbeError::Timeout {
            endpoint: t.endpoint.clone(),
            timeout_ms: 10,
        });
        core.complete_probe(t.generation, t.sequence, &err);

        let q = core.quality_state();
        assert_eq!(q.quality, InternetQuality::Offline);
        assert!(!q.reachable);
        assert!(q.is_checking_offline_recovery);
        assert!(matches!(core.evaluate(), Evaluation::Probe(_)));
    }

    #[test]
    fn only_one_probe_outstanding() {
        let mut core = wifi_core();
        core.set_active_ping_mode(true);
        let t = ticket(core.evaluate());
        assert_eq!(core.evaluate(), Evaluation::ProbeInFlight);
        core.abandon_probe(t.sequence);
        assert!(matches!(core.evaluate(), Evaluation::Probe(_)));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut core = wifi_core();
        let t = ticket(core.evaluate());
        core.begin_generation();
        assert_eq!(
            core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(5))),
            ProbeOutcome::Stale
        );
        assert!(!core.quality_state().reachable);
    }

    #[test]
    fn result_after_disconnect_is_discarded() {
        let mut core = wifi_core();
        let t = ticket(core.evaluate());
        core.apply_network(PathAttributes::unsatisfied().to_network_state());
        assert!(!core.probe_in_flight());
        assert_eq!(
            core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(5))),
            ProbeOutcome::Stale
        );
        assert!(!core.quality_state().reachable);
    }

    #[test]
    fn probe_from_before_a_link_blip_is_stale() {
        let mut core = wifi_core();
        let old = ticket(core.evaluate());

        core.apply_network(PathAttributes::unsatisfied().to_network_state());
        assert_eq!(core.evaluate(), Evaluation::ForcedOffline);
        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());

        // The reconnect gets its own probe instead of waiting on the old one.
        let fresh = ticket(core.evaluate());
        assert_ne!(fresh.sequence, old.sequence);

        let reset = Err(ProbeError::Request {
            endpoint: old.endpoint.clone(),
            message: "connection reset".to_string(),
        });
        assert_eq!(core.complete_probe(old.generation, old.sequence, &reset), ProbeOutcome::Stale);
        assert_eq!(core.quality_state().quality, InternetQuality::Unknown);
        assert!(core.probe_in_flight());

        assert_eq!(
            core.complete_probe(fresh.generation, fresh.sequence, &Ok(Duration::from_millis(30))),
            ProbeOutcome::Applied
        );
        assert!(core.quality_state().reachable);
    }

    #[test]
    fn recovery_flag_tracks_unreachable_state() {
        let mut core = MonitorCore::default();
        let q = core.quality_state();
        assert!(!q.reachable);
        assert!(q.is_checking_offline_recovery);

        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());
        let t = ticket(core.evaluate());
        assert!(core.quality_state().is_checking_offline_recovery);
        core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(20)));
        assert!(!core.quality_state().is_checking_offline_recovery);

        core.apply_network(PathAttributes::unsatisfied().to_network_state());
        assert_eq!(core.evaluate(), Evaluation::ForcedOffline);
        let q = core.quality_state();
        assert!(!q.reachable);
        assert!(q.is_checking_offline_recovery);

        core.apply_network(PathAttributes::satisfied(InterfaceType::Wifi).to_network_state());
        let q = core.quality_state();
        assert!(!q.reachable);
        assert!(q.is_checking_offline_recovery);
        assert_eq!(q.quality, InternetQuality::Unknown);
        assert!(matches!(core.evaluate(), Evaluation::Probe(_)));
    }

    #[test]
    fn reported_latency_and_failure() {
        let mut core = wifi_core();
        assert!(!core.report_latency(-5.0));
        assert_eq!(core.quality_state().quality, InternetQuality::Unknown);

        assert!(core.report_latency(250.0));
        let q = core.quality_state();
        assert_eq!(q.quality, InternetQuality::Good);
        assert!(q.reachable);
        assert!(!q.is_checking_offline_recovery);
        assert_eq!(core.publication().internet_status, InternetStatus::Online);

        core.report_failure();
        let q = core.quality_state();
        assert_eq!(q.quality, InternetQuality::Offline);
        assert!(!q.reachable);
        assert!(q.is_checking_offline_recovery);
        assert_eq!(q.last_latency_ms, -1.0);
        assert_eq!(core.publication().internet_status, InternetStatus::Offline);
    }

    #[test]
    fn probes_rotate_through_endpoints() {
        let mut core = wifi_core();
        core.set_active_ping_mode(true);
        core.set_endpoints(vec!["e0".into(), "e1".into()]);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let t = ticket(core.evaluate());
            seen.push(t.endpoint.clone());
            core.complete_probe(t.generation, t.sequence, &Ok(Duration::from_millis(1)));
        }
        assert_eq!(seen, vec!["e0", "e1", "e0"]);
        assert_eq!(core.quality_state().endpoint_index, 3);
    }
}
