// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login guard behavior against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use syncrelay_config::model::WindowLimit;
use syncrelay_core::RelayError;
use syncrelay_guard::{LoginGuard, MemoryCounterStore};

fn login_guard() -> LoginGuard {
    LoginGuard::new(
        WindowLimit {
            max_events: 5,
            window_secs: 300,
        },
        Arc::new(MemoryCounterStore::new()),
    )
}

#[tokio::test(start_paused = true)]
async fn sixth_attempt_after_five_failures_is_rejected() {
    let guard = login_guard();
    let client = "203.0.113.7";

    for attempt in 1..=5 {
        guard.ensure_allowed(client).await.unwrap();
        assert_eq!(guard.record_failure(client).await.unwrap(), attempt);
    }

    let err = guard.ensure_allowed(client).await.unwrap_err();
    assert!(matches!(err, RelayError::Throttled { ref scope, .. } if scope == "login"));

    // Another address is unaffected.
    guard.ensure_allowed("198.51.100.1").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn success_clears_failures() {
    let guard = login_guard();
    let client = "203.0.113.8";
    for _ in 0..4 {
        guard.record_failure(client).await.unwrap();
    }
    guard.record_success(client).await.unwrap();
    for _ in 0..4 {
        guard.record_failure(client).await.unwrap();
    }
    guard.ensure_allowed(client).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn block_lifts_when_window_elapses() {
    let guard = login_guard();
    let client = "203.0.113.9";
    for _ in 0..5 {
        guard.record_failure(client).await.unwrap();
    }
    assert!(guard.ensure_allowed(client).await.is_err());

    tokio::time::advance(Duration::from_secs(300)).await;
    guard.ensure_allowed(client).await.unwrap();
}
