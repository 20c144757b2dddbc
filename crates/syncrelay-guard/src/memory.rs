// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process counter store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use syncrelay_core::{AdapterType, CounterStore, HealthStatus, PluginAdapter, RelayError};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

/// Per-process fixed-window counters.
///
/// Limits are per instance; use the SQLite store when several processes
/// must share them.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every window that has elapsed for `window`. Returns how many were removed.
    pub fn prune(&self, window: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        before - self.windows.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, RelayError> {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn count(&self, key: &str, window: Duration) -> Result<u64, RelayError> {
        let now = Instant::now();
        Ok(self
            .windows
            .get(key)
            .filter(|w| now.duration_since(w.started) < window)
            .map(|w| w.count)
            .unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<(), RelayError> {
        self.windows.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, older_than: Duration) -> Result<u64, RelayError> {
        Ok(self.prune(older_than) as u64)
    }
}

#[async_trait]
impl PluginAdapter for MemoryCounterStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.windows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn window_expires_after_duration() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("a", MINUTE).await.unwrap(), 1);
        assert_eq!(store.increment("a", MINUTE).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.count("a", MINUTE).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.count("a", MINUTE).await.unwrap(), 0);
        assert_eq!(store.increment("a", MINUTE).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent_and_resettable() {
        let store = MemoryCounterStore::new();
        store.increment("a", MINUTE).await.unwrap();
        store.increment("b", MINUTE).await.unwrap();
        store.reset("a").await.unwrap();
        assert_eq!(store.count("a", MINUTE).await.unwrap(), 0);
        assert_eq!(store.count("b", MINUTE).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_elapsed_windows() {
        let store = MemoryCounterStore::new();
        store.increment("old", MINUTE).await.unwrap();
        tokio::time::advance(Duration::from_secs(90)).await;
        store.increment("new", MINUTE).await.unwrap();
        assert_eq!(store.prune(MINUTE), 1);
        assert_eq!(store.count("new", MINUTE).await.unwrap(), 1);
    }
}
