// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed fixed-window limiter over a pluggable counter store.

use std::sync::Arc;

use syncrelay_config::model::WindowLimit;
use syncrelay_core::{CounterStore, RelayError};
use tracing::{debug, warn};

/// Limits events per identity within a fixed window.
///
/// Counter keys are namespaced by `scope`, so several guards can share one
/// store.
#[derive(Clone)]
pub struct RateGuard {
    scope: &'static str,
    limit: WindowLimit,
    store: Arc<dyn CounterStore>,
}

impl RateGuard {
    pub fn new(scope: &'static str, limit: WindowLimit, store: Arc<dyn CounterStore>) -> Self {
        Self {
            scope,
            limit,
            store,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    pub fn limit(&self) -> WindowLimit {
        self.limit
    }

    fn key(&self, identity: &str) -> String {
        format!("{}:{identity}", self.scope)
    }

    /// Count one event for `identity` and return the count in the current window.
    pub async fn increment(&self, identity: &str) -> Result<u64, RelayError> {
        self.store
            .increment(&self.key(identity), self.limit.window())
            .await
    }

    /// Whether `identity` is over its limit, i.e. its count has reached `max_events`.
    pub async fn check(&self, identity: &str) -> Result<bool, RelayError> {
        let count = self
            .store
            .count(&self.key(identity), self.limit.window())
            .await?;
        Ok(count >= u64::from(self.limit.max_events))
    }

    /// Forget every event counted for `identity`.
    pub async fn reset(&self, identity: &str) -> Result<(), RelayError> {
        self.store.reset(&self.key(identity)).await
    }

    /// Count one event and admit it only if it fits within the limit.
    ///
    /// The event is counted even when rejected, so a flood keeps the
    /// identity throttled until the window ends.
    pub async fn try_acquire(&self, identity: &str) -> Result<(), RelayError> {
        let count = self.increment(identity).await?;
        if count > u64::from(self.limit.max_events) {
            warn!(
                scope = self.scope,
                identity,
                count,
                max_events = self.limit.max_events,
                window_secs = self.limit.window_secs,
                "rate limit exceeded"
            );
            return Err(self.throttled(identity));
        }
        debug!(scope = self.scope, identity, count, "rate guard admitted event");
        Ok(())
    }

    pub(crate) fn throttled(&self, identity: &str) -> RelayError {
        RelayError::Throttled {
            scope: self.scope.to_string(),
            key: identity.to_string(),
        }
    }
}
