// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background removal of elapsed counter windows.
//!
//! Counter keys include client addresses and channel ids, so a store that is
//! never pruned grows with every identity ever seen.

use std::sync::Arc;
use std::time::Duration;

use syncrelay_core::{CounterStore, RelayError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Purges counters older than `retention` every `retention` until `cancel` fires.
///
/// `retention` must be at least the longest window of any guard sharing the
/// store, otherwise live windows are dropped early.
pub async fn run_counter_pruner(
    store: Arc<dyn CounterStore>,
    retention: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(retention.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and there is nothing to prune yet.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = prune_once(store.as_ref(), retention).await {
                    warn!(error = %e, "counter pruning failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("shutdown signal received, stopping counter pruner");
                break;
            }
        }
    }
}

/// One purge pass. Returns how many counters were removed.
pub async fn prune_once(store: &dyn CounterStore, retention: Duration) -> Result<u64, RelayError> {
    let purged = store.purge_expired(retention).await?;
    if purged > 0 {
        debug!(purged, "expired rate counters removed");
    }
    Ok(purged)
}
