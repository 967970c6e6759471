//! Listener registry.
//!
//! Owns every [`ListenerEntry`] behind one mutex. Reads take the same lock as
//! writes; this is a low-contention control-plane map, not a hot data path.
//! Callers only ever receive [`ListenerInfo`] copies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ListenerError;
use crate::storage::ChangeObserver;

use super::config::ListenerConfig;
use super::event::{ChangeEvent, ListenerEvent};
use super::stream::ListenerStream;
use super::throttle::ListenerEntry;

/// Default cap on registered listeners.
pub const DEFAULT_MAX_LISTENERS: usize = 10_000;

/// Default per-listener stream buffer.
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// Copy-out snapshot of a listener.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub id: String,
    pub config: ListenerConfig,
    pub created_at: DateTime<Utc>,
    pub trigger_count: u64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub is_paused: bool,
    pub has_pending_event: bool,
    pub next_allowed_trigger: Option<DateTime<Utc>>,
}

impl From<&ListenerEntry> for ListenerInfo {
    fn from(entry: &ListenerEntry) -> Self {
        Self {
            id: entry.id.clone(),
            config: entry.config.clone(),
            created_at: entry.created_at,
            trigger_count: entry.trigger_count,
            last_triggered: entry.last_triggered,
            is_paused: entry.is_paused,
            has_pending_event: entry.has_pending_event,
            next_allowed_trigger: entry.next_allowed_trigger,
        }
    }
}

/// Outcome of routing one change through the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners whose config watches the change source.
    pub matched: usize,
    /// Listeners the gate let through, in id order.
    pub fired: Vec<String>,
    /// Listeners suppressed by pause or throttle.
    pub suppressed: Vec<String>,
}

#[derive(Debug)]
struct Slot {
    entry: ListenerEntry,
    tx: Sender<ListenerEvent>,
    /// Latest change suppressed during the current throttle window.
    pending: Option<ChangeEvent>,
}

#[derive(Debug)]
struct RegistryState {
    listeners: BTreeMap<String, Slot>,
    max_listeners: usize,
    stream_capacity: usize,
    debug: bool,
}

/// Registry of named listeners.
#[derive(Debug)]
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
    dropped_events: AtomicU64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTENERS, DEFAULT_STREAM_CAPACITY)
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new(max_listeners: usize, stream_capacity: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                listeners: BTreeMap::new(),
                max_listeners,
                stream_capacity: stream_capacity.max(1),
                debug: false,
            }),
            dropped_events: AtomicU64::new(0),
        }
    }

    // Every mutation is a handful of field writes on one slot, so a poisoned
    // map is still consistent.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update runtime settings. `None` leaves a setting unchanged.
    ///
    /// Lowering `max_listeners` below the current size keeps existing
    /// listeners and only rejects further additions.
    pub fn configure(&self, debug: Option<bool>, max_listeners: Option<usize>) {
        let mut state = self.lock();
        if let Some(debug) = debug {
            state.debug = debug;
        }
        if let Some(max) = max_listeners {
            state.max_listeners = max;
        }
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.lock().debug
    }

    #[must_use]
    pub fn max_listeners(&self) -> usize {
        self.lock().max_listeners
    }

    /// Register a listener and obtain the stream its notifications arrive on.
    pub fn add_listener(
        &self,
        id: impl Into<String>,
        config: ListenerConfig,
    ) -> Result<ListenerStream, ListenerError> {
        let id = id.into();
        let mut state = self.lock();

        if state.listeners.contains_key(&id) {
            return Err(ListenerError::DuplicateId { id });
        }
        if state.listeners.len() >= state.max_listeners {
            return Err(ListenerError::CapacityExceeded {
                max: state.max_listeners,
            });
        }
        if id.trim().is_empty() {
            return Err(ListenerError::InvalidConfig {
                reason: "listener id cannot be empty".to_string(),
            });
        }
        config.validate()?;

        let (tx, rx) = bounded::<ListenerEvent>(state.stream_capacity);
        let entry = ListenerEntry::new(id.clone(), config, Utc::now());
        state.listeners.insert(
            id.clone(),
            Slot {
                entry,
                tx,
                pending: None,
            },
        );

        if state.debug {
            debug!(listener = %id, "added listener");
        }

        Ok(ListenerStream::new(id, rx))
    }

    pub fn remove_listener(&self, id: &str) -> Result<(), ListenerError> {
        let mut state = self.lock();
        if state.listeners.remove(id).is_none() {
            return Err(ListenerError::NotFound { id: id.to_string() });
        }
        if state.debug {
            debug!(listener = %id, "removed listener");
        }
        Ok(())
    }

    /// Remove every listener, returning how many there were.
    pub fn remove_all_listeners(&self) -> usize {
        let mut state = self.lock();
        let count = state.listeners.len();
        state.listeners.clear();
        if state.debug {
            debug!(count, "removed all listeners");
        }
        count
    }

    pub fn pause_listener(&self, id: &str) -> Result<(), ListenerError> {
        self.set_paused(id, true)
    }

    /// Resume a paused listener. The throttle window is left as it was.
    pub fn resume_listener(&self, id: &str) -> Result<(), ListenerError> {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: &str, paused: bool) -> Result<(), ListenerError> {
        let mut state = self.lock();
        let debug = state.debug;
        let slot = state
            .listeners
            .get_mut(id)
            .ok_or_else(|| ListenerError::NotFound { id: id.to_string() })?;
        slot.entry.is_paused = paused;
        if debug {
            debug!(listener = %id, paused, "listener pause state changed");
        }
        Ok(())
    }

    #[must_use]
    pub fn has_listener(&self, id: &str) -> bool {
        self.lock().listeners.contains_key(id)
    }

    #[must_use]
    pub fn listener_ids(&self) -> Vec<String> {
        self.lock().listeners.keys().cloned().collect()
    }

    #[must_use]
    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.lock()
            .listeners
            .values()
            .map(|slot| ListenerInfo::from(&slot.entry))
            .collect()
    }

    #[must_use]
    pub fn listener(&self, id: &str) -> Option<ListenerInfo> {
        self.lock()
            .listeners
            .get(id)
            .map(|slot| ListenerInfo::from(&slot.entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().listeners.is_empty()
    }

    /// Notifications that could not be handed to a stream (full or dropped).
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Route a change to every listener watching its source.
    ///
    /// Each matching listener goes through its throttle gate; fired listeners
    /// get the event on their stream, suppressed ones retain it as pending.
    pub fn dispatch(&self, event: &ChangeEvent, now: DateTime<Utc>) -> DispatchReport {
        let mut state = self.lock();
        let mut report = DispatchReport::default();

        for (id, slot) in &mut state.listeners {
            if !slot.entry.config.watches(&event.source) {
                continue;
            }
            report.matched += 1;

            if slot.entry.can_fire(now) {
                slot.pending = None;
                self.deliver(slot, event.clone(), false, now);
                report.fired.push(id.clone());
            } else {
                if slot.entry.has_pending_event {
                    slot.pending = Some(event.clone());
                    trace!(listener = %id, "change throttled");
                }
                report.suppressed.push(id.clone());
            }
        }

        report
    }

    /// Deliver owed events whose throttle window has closed.
    ///
    /// Each listener gets one trailing notification carrying the latest
    /// suppressed change, marked `deferred`. Paused listeners keep their debt
    /// until resumed. Returns the ids that were flushed.
    pub fn flush_pending(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut state = self.lock();
        let mut flushed = Vec::new();

        for (id, slot) in &mut state.listeners {
            if !slot.entry.pending_due(now) {
                continue;
            }
            let Some(event) = slot.pending.take() else {
                slot.entry.has_pending_event = false;
                continue;
            };
            if slot.entry.can_fire(now) {
                self.deliver(slot, event, true, now);
                flushed.push(id.clone());
            }
        }

        flushed
    }

    fn deliver(&self, slot: &Slot, change: ChangeEvent, deferred: bool, now: DateTime<Utc>) {
        let event = ListenerEvent {
            listener_id: slot.entry.id.clone(),
            change,
            deferred,
            delivered_at: now,
        };
        // Never block the notifying thread on a slow consumer.
        match slot.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl ChangeObserver for ListenerRegistry {
    fn on_change(&self, event: &ChangeEvent) {
        self.dispatch(event, Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::listener::config::{KeyWatch, TableWatch};
    use crate::listener::event::ChangeSource;

    fn kv_config() -> ListenerConfig {
        ListenerConfig::key_value(KeyWatch::keys(["k"]))
    }

    fn kv_event() -> ChangeEvent {
        ChangeEvent::new(ChangeSource::key("default", "k"))
    }

    #[test]
    fn add_then_query_returns_zeroed_snapshot() {
        let reg = ListenerRegistry::default();
        let _stream = reg.add_listener("a", kv_config()).unwrap();

        assert!(reg.has_listener("a"));
        let info = reg.listener("a").unwrap();
        assert_eq!(info.trigger_count, 0);
        assert!(!info.is_paused);
        assert!(info.last_triggered.is_none());
        assert!(!info.has_pending_event);
    }

    #[test]
    fn duplicate_id_is_rejected_and_existing_entry_untouched() {
        let reg = ListenerRegistry::default();
        let _s = reg.add_listener("a", kv_config().with_throttle_ms(50)).unwrap();
        reg.dispatch(&kv_event(), Utc::now());
        let before = reg.listener("a").unwrap();

        let err = reg
            .add_listener("a", ListenerConfig::relational(TableWatch::default()))
            .unwrap_err();
        assert_eq!(err, ListenerError::DuplicateId { id: "a".to_string() });
        assert_eq!(reg.listener("a").unwrap(), before);
    }

    #[test]
    fn capacity_is_enforced() {
        let reg = ListenerRegistry::new(2, 8);
        let _a = reg.add_listener("a", kv_config()).unwrap();
        let _b = reg.add_listener("b", kv_config()).unwrap();
        let err = reg.add_listener("c", kv_config()).unwrap_err();
        assert_eq!(err, ListenerError::CapacityExceeded { max: 2 });

        reg.configure(None, Some(3));
        assert!(reg.add_listener("c", kv_config()).is_ok());
    }

    #[test]
    fn invalid_config_and_empty_id_are_rejected() {
        let reg = ListenerRegistry::default();
        assert!(matches!(
            reg.add_listener("a", ListenerConfig::default()),
            Err(ListenerError::InvalidConfig { .. })
        ));
        assert!(matches!(
            reg.add_listener("  ", kv_config()),
            Err(ListenerError::InvalidConfig { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_and_remove_all() {
        let reg = ListenerRegistry::default();
        for id in ["a", "b", "c"] {
            let _ = reg.add_listener(id, kv_config()).unwrap();
        }
        reg.remove_listener("b").unwrap();
        assert_eq!(
            reg.remove_listener("b"),
            Err(ListenerError::NotFound { id: "b".to_string() })
        );

        assert_eq!(reg.remove_all_listeners(), 2);
        assert!(reg.listener_ids().is_empty());
        assert_eq!(reg.remove_all_listeners(), 0);
    }

    #[test]
    fn pause_resume_unknown_id_fails() {
        let reg = ListenerRegistry::default();
        assert!(matches!(reg.pause_listener("x"), Err(ListenerError::NotFound { .. })));
        assert!(matches!(reg.resume_listener("x"), Err(ListenerError::NotFound { .. })));
    }

    #[test]
    fn dispatch_delivers_to_matching_listeners_only() {
        let reg = ListenerRegistry::default();
        let a = reg.add_listener("a", kv_config()).unwrap();
        let b = reg
            .add_listener("b", ListenerConfig::relational(TableWatch::tables(["t"])))
            .unwrap();

        let report = reg.dispatch(&kv_event(), Utc::now());
        assert_eq!(report.matched, 1);
        assert_eq!(report.fired, vec!["a".to_string()]);

        let ev = a.try_recv().unwrap().unwrap();
        assert_eq!(ev.listener_id, "a");
        assert!(!ev.deferred);
        assert!(b.try_recv().unwrap().is_none());
        assert_eq!(reg.listener("a").unwrap().trigger_count, 1);
    }

    #[test]
    fn throttled_listener_gets_trailing_flush() {
        let reg = ListenerRegistry::default();
        let stream = reg.add_listener("a", kv_config().with_throttle_ms(1000)).unwrap();
        let t0 = Utc::now();

        assert_eq!(reg.dispatch(&kv_event(), t0).fired.len(), 1);
        let second = kv_event();
        let report = reg.dispatch(&second, t0 + Duration::milliseconds(500));
        assert_eq!(report.suppressed, vec!["a".to_string()]);
        assert!(reg.listener("a").unwrap().has_pending_event);

        assert!(reg.flush_pending(t0 + Duration::milliseconds(900)).is_empty());
        assert_eq!(
            reg.flush_pending(t0 + Duration::milliseconds(1000)),
            vec!["a".to_string()]
        );

        let events = stream.drain();
        assert_eq!(events.len(), 2);
        assert!(events[1].deferred);
        assert_eq!(events[1].change.event_id, second.event_id);

        let info = reg.listener("a").unwrap();
        assert_eq!(info.trigger_count, 2);
        assert!(!info.has_pending_event);
    }

    #[test]
    fn paused_listener_is_suppressed_without_pending() {
        let reg = ListenerRegistry::default();
        let stream = reg.add_listener("a", kv_config()).unwrap();
        reg.pause_listener("a").unwrap();

        let report = reg.dispatch(&kv_event(), Utc::now());
        assert_eq!(report.suppressed, vec!["a".to_string()]);
        assert!(stream.try_recv().unwrap().is_none());
        assert!(!reg.listener("a").unwrap().has_pending_event);

        reg.resume_listener("a").unwrap();
        assert_eq!(reg.dispatch(&kv_event(), Utc::now()).fired.len(), 1);
    }

    #[test]
    fn full_or_dropped_stream_counts_dropped_events() {
        let reg = ListenerRegistry::new(10, 1);
        let stream = reg.add_listener("a", kv_config()).unwrap();
        reg.dispatch(&kv_event(), Utc::now());
        reg.dispatch(&kv_event(), Utc::now());
        assert_eq!(reg.dropped_events(), 1);

        drop(stream);
        reg.dispatch(&kv_event(), Utc::now());
        assert_eq!(reg.dropped_events(), 2);
    }

    #[test]
    fn removing_listener_disconnects_stream() {
        let reg = ListenerRegistry::default();
        let stream = reg.add_listener("a", kv_config()).unwrap();
        reg.remove_listener("a").unwrap();
        assert!(stream.recv().is_err());
    }
}
