// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the syncrelay engine.

use thiserror::Error;

use crate::types::Platform;

/// The primary error type used across all syncrelay traits and core operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced pairing, record, job, preset, or media asset does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique key is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A rate guard rejected the request for this key.
    #[error("throttled: {scope} limit reached for `{key}`")]
    Throttled { scope: String, key: String },

    /// A downstream platform call failed.
    #[error("adapter failure on {platform}: {message}")]
    AdapterFailure {
        platform: Platform,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested transition is not permitted from the entity's current state.
    #[error("invalid state for {entity} {id}: cannot move from {from} to {to}")]
    InvalidState {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a [`RelayError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an [`RelayError::AdapterFailure`] without an underlying source.
    pub fn adapter(platform: Platform, message: impl Into<String>) -> Self {
        Self::AdapterFailure {
            platform,
            message: message.into(),
            source: None,
        }
    }

    /// Whether the failure is recorded on the owning entity and may be retried.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, Self::AdapterFailure { .. } | Self::Timeout { .. })
    }
}
