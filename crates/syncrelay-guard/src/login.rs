// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failed-login throttling keyed by client address.

use std::sync::Arc;

use syncrelay_config::model::WindowLimit;
use syncrelay_core::{CounterStore, RelayError};
use tracing::{info, warn};

use crate::rate::RateGuard;

/// Blocks a client address after too many failed logins within the window.
///
/// Only failures are counted. A successful login clears the address.
#[derive(Clone)]
pub struct LoginGuard {
    guard: RateGuard,
}

impl LoginGuard {
    pub fn new(limit: WindowLimit, store: Arc<dyn CounterStore>) -> Self {
        Self {
            guard: RateGuard::new("login", limit, store),
        }
    }

    /// Fails with [`RelayError::Throttled`] while `client` is blocked.
    pub async fn ensure_allowed(&self, client: &str) -> Result<(), RelayError> {
        if self.guard.check(client).await? {
            warn!(client, "login attempt rejected: too many failures");
            return Err(self.guard.throttled(client));
        }
        Ok(())
    }

    /// Count a failed attempt. Returns failures in the current window.
    pub async fn record_failure(&self, client: &str) -> Result<u64, RelayError> {
        let failures = self.guard.increment(client).await?;
        if failures >= u64::from(self.guard.limit().max_events) {
            info!(
                client,
                failures,
                window_secs = self.guard.limit().window_secs,
                "client blocked after repeated login failures"
            );
        }
        Ok(failures)
    }

    /// Clear the failure count after a successful login.
    pub async fn record_success(&self, client: &str) -> Result<(), RelayError> {
        self.guard.reset(client).await
    }
}
