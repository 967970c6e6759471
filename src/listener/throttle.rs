//! Leading-edge throttle gate.
//!
//! The first event of a window fires immediately; later events inside the
//! window are suppressed and only mark the entry as owing a delivery. What to
//! do with that debt is the registry's business (see
//! [`ListenerRegistry::flush_pending`](super::ListenerRegistry::flush_pending)).

use chrono::{DateTime, Duration, Utc};

use super::config::ListenerConfig;

/// Registry-owned bookkeeping for one listener.
#[derive(Debug, Clone)]
pub struct ListenerEntry {
    pub(crate) id: String,
    pub(crate) config: ListenerConfig,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) trigger_count: u64,
    pub(crate) last_triggered: Option<DateTime<Utc>>,
    pub(crate) is_paused: bool,
    /// Throttle window boundary; events before this instant are suppressed.
    pub(crate) next_allowed_trigger: Option<DateTime<Utc>>,
    pub(crate) has_pending_event: bool,
}

impl ListenerEntry {
    pub(crate) fn new(id: String, config: ListenerConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            config,
            created_at,
            trigger_count: 0,
            last_triggered: None,
            is_paused: false,
            next_allowed_trigger: None,
            has_pending_event: false,
        }
    }

    /// Decide whether a change may be delivered now, updating bookkeeping.
    ///
    /// Returns `false` when paused (no bookkeeping change) or when inside an
    /// active throttle window (marks a pending event).
    pub fn can_fire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paused {
            return false;
        }

        if let Some(throttle_ms) = self.config.throttle_ms() {
            if self.next_allowed_trigger.is_some_and(|boundary| now < boundary) {
                self.has_pending_event = true;
                return false;
            }
            self.next_allowed_trigger = Some(window_end(now, throttle_ms));
        }

        self.record_trigger(now);
        true
    }

    /// Whether a suppressed event is owed and its window has closed.
    #[must_use]
    pub fn pending_due(&self, now: DateTime<Utc>) -> bool {
        self.has_pending_event
            && !self.is_paused
            && self.next_allowed_trigger.map_or(true, |boundary| now >= boundary)
    }

    fn record_trigger(&mut self, now: DateTime<Utc>) {
        self.trigger_count += 1;
        self.last_triggered = Some(now);
        self.has_pending_event = false;
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    #[must_use]
    pub const fn has_pending_event(&self) -> bool {
        self.has_pending_event
    }

    #[must_use]
    pub const fn next_allowed_trigger(&self) -> Option<DateTime<Utc>> {
        self.next_allowed_trigger
    }
}

fn window_end(now: DateTime<Utc>, throttle_ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(throttle_ms).unwrap_or(i64::MAX).min(i64::MAX / 2);
    now.checked_add_signed(Duration::milliseconds(ms))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
