//! Error types for the library's failure domains.
//!
//! Absence (no such service, no token, no candidates) is never an error here; it is
//! modelled with `Option` and empty collections. These enums cover the two other
//! categories: transient backend failures, and contract violations that indicate a
//! defect in the caller.

use std::time::Duration;
use thiserror::Error;

/// Contract violations raised by [`crate::graph::MediaGraph`] mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("edge {from} -> {to} references missing node `{missing}`")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    #[error("node `{0}` already exists; only its label may be refreshed")]
    DuplicateNode(String),

    #[error("node `{0}` does not exist")]
    UnknownNode(String),

    #[error("edge {from} -> {to} has weight {weight}; weights must be finite and non-negative")]
    InvalidWeight { from: String, to: String, weight: f64 },
}

/// Failures reported by the token vault backing a service's connection state.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("token storage failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("token storage task failed: {0}")]
    Task(String),
}

/// Transient failures of a backend call (connect, recommend, play, poll).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service `{service_id}` is unreachable: {reason}")]
    Unreachable { service_id: String, reason: String },

    #[error("service `{service_id}` timed out after {timeout:?}")]
    Timeout {
        service_id: String,
        timeout: Duration,
    },

    #[error("item `{item_id}` not found on service `{service_id}`")]
    ItemNotFound { service_id: String, item_id: String },

    #[error("service `{service_id}` is not connected")]
    NotConnected { service_id: String },

    #[error("authorization with `{service_id}` failed: {reason}")]
    Authorization { service_id: String, reason: String },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl ServiceError {
    pub fn unreachable(service_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            service_id: service_id.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(service_id: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            service_id: service_id.into(),
            timeout,
        }
    }

    /// True for failures the next poll cycle may clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }
}

/// Misuse of [`crate::sync::SessionSyncStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("stop() called with no matching start(); owner count is already zero")]
    OwnerUnderflow,

    #[error("session sync needs a running tokio runtime")]
    NoRuntime,
}
