use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{ExecutionError, WireError, WireResult};

use super::event::ListenerEvent;

/// Receiving end of a listener registration.
///
/// The stream disconnects once its listener is removed from the registry.
/// Dropping the stream does not remove the listener; deliveries to a dropped
/// stream are counted as dropped events.
#[derive(Debug)]
pub struct ListenerStream {
    listener_id: String,
    rx: Receiver<ListenerEvent>,
}

impl ListenerStream {
    pub(crate) fn new(listener_id: String, rx: Receiver<ListenerEvent>) -> Self {
        Self { listener_id, rx }
    }

    /// The listener id backing this stream.
    #[must_use]
    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> WireResult<ListenerEvent> {
        self.rx.recv().map_err(|_| self.disconnected())
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> WireResult<ListenerEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WireError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => self.disconnected(),
        })
    }

    /// Non-blocking receive. `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&self) -> WireResult<Option<ListenerEvent>> {
        match self.rx.try_recv() {
            Ok(ev) => Ok(Some(ev)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<ListenerEvent> {
        self.rx.try_iter().collect()
    }

    fn disconnected(&self) -> WireError {
        WireError::Execution(ExecutionError::Disconnected {
            path: format!("listener_stream:{}", self.listener_id),
        })
    }
}
