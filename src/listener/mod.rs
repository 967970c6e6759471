//! Listener subsystem: named observers of storage changes.
//!
//! Listeners register a [`ListenerConfig`] describing which key-value keys or
//! relational tables they care about, and get back a [`ListenerStream`].
//! Every change routed through the [`ListenerRegistry`] passes each matching
//! listener's throttle gate before it is delivered.

/// Watch targets and throttle options.
pub mod config;
/// Change notification types.
pub mod event;
/// Registry of listeners and change dispatch.
pub mod registry;
/// Subscriber stream handle.
pub mod stream;
/// Per-listener throttle bookkeeping.
pub mod throttle;

pub use config::{CombinedWatch, KeyWatch, ListenerConfig, ListenerOptions, TableWatch};
pub use event::{ChangeEvent, ChangeSource, ListenerEvent, DEFAULT_DATABASE, DEFAULT_INSTANCE};
pub use registry::{
    DispatchReport, ListenerInfo, ListenerRegistry, DEFAULT_MAX_LISTENERS, DEFAULT_STREAM_CAPACITY,
};
pub use stream::ListenerStream;
pub use throttle::ListenerEntry;
