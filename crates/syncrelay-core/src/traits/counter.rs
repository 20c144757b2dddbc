// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable backend for fixed-window rate counters.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;

/// Keyed counters that expire at the end of a fixed window.
///
/// The window starts at the first increment after the previous window
/// elapsed. Backends shared between processes make limits global.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments `key` within its current window and returns the new count.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, RelayError>;

    /// Current count for `key`, or 0 when no window is open.
    async fn count(&self, key: &str, window: Duration) -> Result<u64, RelayError>;

    /// Drops the counter for `key`.
    async fn reset(&self, key: &str) -> Result<(), RelayError>;

    /// Drops every counter whose window opened at least `older_than` ago.
    /// Returns how many were removed.
    async fn purge_expired(&self, older_than: Duration) -> Result<u64, RelayError>;
}
