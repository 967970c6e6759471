//! Error types for statewire.
//!
//! All errors are strongly typed using thiserror. Registry and storage
//! failures are expected, caller-correctable conditions and are always
//! returned, never raised as panics.

use thiserror::Error;

/// Errors raised by the listener registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("Listener with ID '{id}' already exists")]
    DuplicateId {
        id: String,
    },

    #[error("Listener '{id}' not found")]
    NotFound {
        id: String,
    },

    #[error("Maximum listener limit reached ({max})")]
    CapacityExceeded {
        max: usize,
    },

    #[error("Invalid listener config: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors raised by the storage collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage instance '{instance}' not initialized")]
    NotInitialized {
        instance: String,
    },

    #[error("Storage root already initialized at {path}")]
    AlreadyInitialized {
        path: String,
    },

    #[error("Storage root path not set and could not be detected")]
    MissingRootPath,

    #[error("Key '{key}' not found")]
    KeyNotFound {
        key: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors produced by a connectivity probe.
///
/// Probe failures are folded into an offline verdict by the monitor and
/// retried on the next tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Probe to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },

    #[error("Probe to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        message: String,
    },

    #[error("Invalid probe endpoint '{endpoint}'")]
    InvalidEndpoint {
        endpoint: String,
    },
}

/// Errors from the background machinery (threads, channels).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Failed to spawn worker '{name}': {message}")]
    Spawn {
        name: String,
        message: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Top-level error type for statewire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl WireError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::InvalidConfig {
            reason: reason.into(),
        })
    }

    /// Returns true if this is a listener registry error.
    #[must_use]
    pub const fn is_listener(&self) -> bool {
        matches!(self, Self::Listener(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a probe error.
    #[must_use]
    pub const fn is_probe(&self) -> bool {
        matches!(self, Self::Probe(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call can succeed without caller changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Listener(_) => false,
            Self::Storage(e) => matches!(e, StorageError::Backend(_)),
            Self::Probe(e) => matches!(e, ProbeError::Timeout { .. } | ProbeError::Request { .. }),
            Self::Execution(e) => matches!(e, ExecutionError::Timeout { .. }),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for statewire operations.
pub type WireResult<T> = Result<T, WireError>;
