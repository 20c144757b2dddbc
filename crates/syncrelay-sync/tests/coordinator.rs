// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync coordinator behavior against a temp SQLite database and a mock dispatcher.

use std::sync::Arc;
use std::time::Duration;

use syncrelay_config::model::SyncConfig;
use syncrelay_core::{
    AdapterState, Metadata, NewPairing, Platform, RelayError, SyncLedger, SyncStatus,
};
use syncrelay_guard::{MemoryCounterStore, RateGuard};
use syncrelay_sync::{ChannelRegistry, SyncCoordinator, SyncOutcome};
use syncrelay_test_utils::{TestHarness, create_event, edit_event};

async fn paired_harness() -> TestHarness {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness
}

/// A second coordinator on the same database, as another process would run it:
/// its own registry cache, key locks and counters.
fn rival_coordinator(harness: &TestHarness) -> SyncCoordinator {
    let registry = Arc::new(ChannelRegistry::new(
        harness.storage.clone(),
        harness.config.sync.registry_ttl(),
    ));
    let guard = RateGuard::new(
        "inbound_sync",
        harness.config.rate_limit.inbound_sync,
        Arc::new(MemoryCounterStore::new()),
    );
    SyncCoordinator::new(
        &harness.config.sync,
        registry,
        harness.storage.clone(),
        harness.dispatcher.clone(),
        guard,
    )
}

fn fast_retry_config() -> SyncConfig {
    SyncConfig {
        retry_base_delay_ms: 0,
        retry_max_delay_ms: 0,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn new_message_is_relayed_to_counterpart() {
    let harness = paired_harness().await;

    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Relayed {
        record_id,
        paired_message_id,
    } = outcome
    else {
        panic!("expected Relayed, got {outcome:?}");
    };
    assert_eq!(paired_message_id, "d1");

    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.status, SyncStatus::Completed);
    assert_eq!(record.paired_platform, Platform::Discord);
    assert_eq!(record.paired_message_id.as_deref(), Some("d1"));
    assert_eq!(record.attempts, 1);

    let relays = harness.dispatcher.relays().await;
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].platform, Platform::Discord);
    assert_eq!(relays[0].channel_id, "456");
    assert_eq!(relays[0].content, "hello");
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn pairing_works_in_both_directions() {
    let harness = paired_harness().await;
    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Discord, "456", "m77", "from discord"))
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Relayed { .. }));

    let relays = harness.dispatcher.relays().await;
    assert_eq!(relays[0].platform, Platform::Telegram);
    assert_eq!(relays[0].channel_id, "123");
}

#[tokio::test]
async fn echo_of_relayed_message_is_suppressed() {
    let harness = paired_harness().await;
    let first = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Relayed { record_id, .. } = first else {
        panic!("expected Relayed, got {first:?}");
    };

    // Discord reports the message we just posted there.
    let echo = harness
        .coordinator
        .handle_event(&create_event(Platform::Discord, "456", "d1", "hello"))
        .await
        .unwrap();
    assert_eq!(echo, SyncOutcome::LoopSuppressed { record_id });

    assert_eq!(harness.dispatcher.relays().await.len(), 1);
    let records = harness.coordinator.list_records(None, 10).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn redelivered_event_is_not_relayed_twice() {
    let harness = paired_harness().await;
    let event = create_event(Platform::Telegram, "123", "t1", "hello");

    let first = harness.coordinator.handle_event(&event).await.unwrap();
    let second = harness.coordinator.handle_event(&event).await.unwrap();
    let SyncOutcome::Relayed { record_id, .. } = first else {
        panic!("expected Relayed, got {first:?}");
    };
    assert_eq!(second, SyncOutcome::Unchanged { record_id });

    assert_eq!(harness.dispatcher.relays().await.len(), 1);
    assert_eq!(
        harness.coordinator.list_records(None, 10).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn concurrent_deliveries_of_one_message_relay_once() {
    let harness = paired_harness().await;
    let event = create_event(Platform::Telegram, "123", "t1", "hello");

    let mut handles = Vec::new();
    for _ in 0..5 {
        let coordinator = Arc::clone(&harness.coordinator);
        let event = event.clone();
        handles.push(tokio::spawn(
            async move { coordinator.handle_event(&event).await },
        ));
    }
    let mut relayed = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            SyncOutcome::Relayed { .. } => relayed += 1,
            SyncOutcome::Unchanged { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(relayed, 1);
    assert_eq!(harness.dispatcher.relays().await.len(), 1);
}

#[tokio::test]
async fn second_process_does_not_relay_a_message_in_flight() {
    let harness = paired_harness().await;
    let rival = rival_coordinator(&harness);
    harness
        .dispatcher
        .set_delay(Some(Duration::from_millis(300)))
        .await;
    let event = create_event(Platform::Telegram, "123", "t1", "hello");

    let owner = {
        let coordinator = Arc::clone(&harness.coordinator);
        let event = event.clone();
        tokio::spawn(async move { coordinator.handle_event(&event).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let late = rival.handle_event(&event).await.unwrap();
    let first = owner.await.unwrap().unwrap();

    let SyncOutcome::Relayed { record_id, .. } = first else {
        panic!("expected Relayed, got {first:?}");
    };
    assert_eq!(late, SyncOutcome::InFlight { record_id });
    assert_eq!(harness.dispatcher.relays().await.len(), 1);
    assert!(harness.dispatcher.edits().await.is_empty());

    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.status, SyncStatus::Completed);
    assert_eq!(record.paired_message_id.as_deref(), Some("d1"));
    assert_eq!(record.attempts, 1);
}

#[tokio::test]
async fn edit_arriving_mid_flight_is_sent_by_the_owner() {
    let harness = paired_harness().await;
    let rival = rival_coordinator(&harness);
    harness
        .dispatcher
        .set_delay(Some(Duration::from_millis(300)))
        .await;

    let owner = {
        let coordinator = Arc::clone(&harness.coordinator);
        tokio::spawn(async move {
            coordinator
                .handle_event(&create_event(Platform::Telegram, "123", "t1", "helo"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let late = rival
        .handle_event(&edit_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    assert!(matches!(late, SyncOutcome::InFlight { .. }));

    let settled = owner.await.unwrap().unwrap();
    assert!(matches!(
        settled,
        SyncOutcome::Edited { ref paired_message_id, .. } if paired_message_id == "d1"
    ));

    let relays = harness.dispatcher.relays().await;
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].content, "helo");
    let edits = harness.dispatcher.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].message_id, "d1");
    assert_eq!(edits[0].content, "hello");

    let record = harness
        .storage
        .find_by_source(Platform::Telegram, "t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SyncStatus::Completed);
    assert_eq!(record.content, "hello");
}

#[tokio::test]
async fn edit_after_pairing_is_repointed_relays_to_new_target() {
    let harness = paired_harness().await;
    let pairing = harness
        .registry
        .find_pairing(Platform::Telegram, "123")
        .await
        .unwrap()
        .unwrap();
    harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();

    harness
        .registry
        .upsert_pairing(
            Some(pairing.id),
            &NewPairing {
                platform: Platform::Telegram,
                channel_id: "123".into(),
                channel_name: None,
                paired_platform: Platform::Youtube,
                paired_channel_id: "789".into(),
                is_active: true,
                config: Metadata::new(),
            },
        )
        .await
        .unwrap();

    let outcome = harness
        .coordinator
        .handle_event(&edit_event(Platform::Telegram, "123", "t1", "hello v2"))
        .await
        .unwrap();
    let SyncOutcome::Relayed {
        record_id,
        paired_message_id,
    } = outcome
    else {
        panic!("expected Relayed, got {outcome:?}");
    };
    assert_eq!(paired_message_id, "d2");
    assert!(harness.dispatcher.edits().await.is_empty());

    let relays = harness.dispatcher.relays().await;
    assert_eq!(relays.len(), 2);
    assert_eq!(relays[1].platform, Platform::Youtube);
    assert_eq!(relays[1].channel_id, "789");

    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.paired_platform, Platform::Youtube);
    assert_eq!(record.paired_channel_id, "789");
    assert_eq!(record.paired_message_id.as_deref(), Some("d2"));
}

#[tokio::test]
async fn retry_follows_repointed_pairing() {
    let harness = paired_harness().await;
    let pairing = harness
        .registry
        .find_pairing(Platform::Telegram, "123")
        .await
        .unwrap()
        .unwrap();
    harness.dispatcher.fail_next(1, "discord is down").await;
    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Failed { .. }));

    harness
        .registry
        .upsert_pairing(
            Some(pairing.id),
            &NewPairing {
                platform: Platform::Telegram,
                channel_id: "123".into(),
                channel_name: None,
                paired_platform: Platform::Discord,
                paired_channel_id: "999".into(),
                is_active: true,
                config: Metadata::new(),
            },
        )
        .await
        .unwrap();

    let retried = harness.coordinator.retry_due().await.unwrap();
    assert!(matches!(retried.as_slice(), [SyncOutcome::Relayed { .. }]));
    let relays = harness.dispatcher.relays().await;
    assert_eq!(relays.last().map(|r| r.channel_id.as_str()), Some("999"));
}

#[tokio::test]
async fn edit_updates_paired_message_in_place() {
    let harness = paired_harness().await;
    harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "helo"))
        .await
        .unwrap();

    let outcome = harness
        .coordinator
        .handle_event(&edit_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Edited {
        record_id,
        paired_message_id,
    } = outcome
    else {
        panic!("expected Edited, got {outcome:?}");
    };
    assert_eq!(paired_message_id, "d1");

    let edits = harness.dispatcher.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].platform, Platform::Discord);
    assert_eq!(edits[0].message_id, "d1");
    assert_eq!(edits[0].content, "hello");
    assert_eq!(harness.dispatcher.relays().await.len(), 1);

    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.content, "hello");
    assert_eq!(record.status, SyncStatus::Completed);
}

#[tokio::test]
async fn unpaired_channel_has_no_sync_config() {
    let harness = paired_harness().await;
    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Twitch, "stream-1", "x1", "hi"))
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::NoSyncConfig);
    assert!(
        harness
            .coordinator
            .list_records(None, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn inactive_pairing_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    let pairing = harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness.registry.set_active(pairing.id, false).await.unwrap();

    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::NoSyncConfig);
    assert!(harness.dispatcher.relays().await.is_empty());
}

#[tokio::test]
async fn flood_from_one_channel_is_throttled() {
    let harness = TestHarness::builder()
        .with_inbound_limit(2, 60)
        .build()
        .await
        .unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();

    let mut outcomes = Vec::new();
    for i in 0..3 {
        let event = create_event(Platform::Telegram, "123", &format!("t{i}"), "spam");
        outcomes.push(harness.coordinator.handle_event(&event).await.unwrap());
    }
    assert!(matches!(outcomes[0], SyncOutcome::Relayed { .. }));
    assert!(matches!(outcomes[1], SyncOutcome::Relayed { .. }));
    assert_eq!(outcomes[2], SyncOutcome::Throttled);

    // Nothing about the dropped event reaches the ledger.
    assert!(
        harness
            .storage
            .find_by_source(Platform::Telegram, "t2")
            .await
            .unwrap()
            .is_none()
    );

    // Other channels keep their own budget.
    harness
        .pair(Platform::Youtube, "yt", Platform::Rutube, "rt")
        .await
        .unwrap();
    let other = harness
        .coordinator
        .handle_event(&create_event(Platform::Youtube, "yt", "c1", "hi"))
        .await
        .unwrap();
    assert!(matches!(other, SyncOutcome::Relayed { .. }));
}

#[tokio::test]
async fn dispatch_failure_is_recorded_and_retried() {
    let harness = TestHarness::builder()
        .with_sync_config(fast_retry_config())
        .build()
        .await
        .unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness.dispatcher.fail_next(1, "502 bad gateway").await;

    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Failed {
        record_id,
        reason,
        retry_at,
    } = outcome
    else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(reason.contains("502 bad gateway"));
    assert!(retry_at.is_some());

    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.status, SyncStatus::Failed);
    assert_eq!(record.attempts, 1);
    assert!(record.last_error.is_some());

    let retried = harness.coordinator.retry_due().await.unwrap();
    assert_eq!(
        retried,
        vec![SyncOutcome::Relayed {
            record_id,
            paired_message_id: "d1".into()
        }]
    );
    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.status, SyncStatus::Completed);
    assert!(record.last_error.is_none());
    assert!(harness.coordinator.retry_due().await.unwrap().is_empty());
}

#[tokio::test]
async fn retries_stop_after_max_attempts() {
    let harness = TestHarness::builder()
        .with_sync_config(fast_retry_config())
        .build()
        .await
        .unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness.dispatcher.fail_next(5, "discord is down").await;

    let first = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    assert!(matches!(first, SyncOutcome::Failed { retry_at: Some(_), .. }));

    let second = harness.coordinator.retry_due().await.unwrap();
    assert!(matches!(
        second.as_slice(),
        [SyncOutcome::Failed { retry_at: Some(_), .. }]
    ));

    let third = harness.coordinator.retry_due().await.unwrap();
    let [SyncOutcome::Failed {
        record_id,
        retry_at: None,
        ..
    }] = third.as_slice()
    else {
        panic!("expected a final failure, got {third:?}");
    };

    assert!(harness.coordinator.retry_due().await.unwrap().is_empty());
    let record = harness.coordinator.get_record(*record_id).await.unwrap();
    assert_eq!(record.status, SyncStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert!(record.next_retry_at.is_none());
}

#[tokio::test]
async fn operator_retry_ignores_attempt_budget() {
    let harness = TestHarness::builder()
        .with_sync_config(SyncConfig {
            max_attempts: 1,
            ..fast_retry_config()
        })
        .build()
        .await
        .unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness.dispatcher.fail_next(1, "rate limited").await;

    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Failed {
        record_id,
        retry_at: None,
        ..
    } = outcome
    else {
        panic!("expected a final failure, got {outcome:?}");
    };
    assert!(harness.coordinator.retry_due().await.unwrap().is_empty());

    let retried = harness.coordinator.retry_record(record_id).await.unwrap();
    assert!(matches!(retried, SyncOutcome::Relayed { .. }));

    // Completed records are not retryable.
    let err = harness
        .coordinator
        .retry_record(record_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidState { .. }));
    let err = harness.coordinator.retry_record(9_999).await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound { .. }));
}

#[tokio::test]
async fn slow_dispatcher_times_out() {
    let harness = TestHarness::builder()
        .with_sync_config(SyncConfig {
            dispatch_timeout_secs: 1,
            ..fast_retry_config()
        })
        .build()
        .await
        .unwrap();
    harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness
        .dispatcher
        .set_delay(Some(Duration::from_secs(3)))
        .await;

    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Failed { reason, .. } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(reason.contains("timed out"));
}

#[tokio::test]
async fn retry_without_pairing_is_abandoned() {
    let harness = TestHarness::builder()
        .with_sync_config(fast_retry_config())
        .build()
        .await
        .unwrap();
    let pairing = harness
        .pair(Platform::Telegram, "123", Platform::Discord, "456")
        .await
        .unwrap();
    harness.dispatcher.fail_next(1, "boom").await;
    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Failed { record_id, .. } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };

    harness.registry.delete(pairing.id).await.unwrap();
    let retried = harness.coordinator.retry_due().await.unwrap();
    assert_eq!(retried, vec![SyncOutcome::NoSyncConfig]);

    // History survives the pairing and is no longer scheduled.
    let record = harness.coordinator.get_record(record_id).await.unwrap();
    assert_eq!(record.pairing_id, None);
    assert_eq!(record.status, SyncStatus::Failed);
    assert!(record.next_retry_at.is_none());
    assert!(harness.coordinator.retry_due().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_record_removes_history() {
    let harness = paired_harness().await;
    let outcome = harness
        .coordinator
        .handle_event(&create_event(Platform::Telegram, "123", "t1", "hello"))
        .await
        .unwrap();
    let SyncOutcome::Relayed { record_id, .. } = outcome else {
        panic!("expected Relayed, got {outcome:?}");
    };

    harness.coordinator.delete_record(record_id).await.unwrap();
    assert!(matches!(
        harness.coordinator.get_record(record_id).await.unwrap_err(),
        RelayError::NotFound { .. }
    ));
    assert!(matches!(
        harness.coordinator.delete_record(record_id).await.unwrap_err(),
        RelayError::NotFound { .. }
    ));
}

#[tokio::test]
async fn adapter_health_reflects_reports() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.health.report(Platform::Telegram, None).await.unwrap();
    harness
        .health
        .report(Platform::Discord, Some("gateway disconnected".into()))
        .await
        .unwrap();

    let telegram = harness.health.status(Platform::Telegram).await.unwrap();
    assert_eq!(telegram.state, AdapterState::Online);
    let discord = harness.health.status(Platform::Discord).await.unwrap();
    assert_eq!(discord.state, AdapterState::Error);

    let all = harness.health.statuses().await.unwrap();
    assert_eq!(all.len(), Platform::ALL.len());
    let twitch = all
        .iter()
        .find(|s| s.platform == Platform::Twitch)
        .unwrap();
    assert_eq!(twitch.state, AdapterState::Offline);

    // A later clean report clears the error.
    harness.health.report(Platform::Discord, None).await.unwrap();
    let discord = harness.health.status(Platform::Discord).await.unwrap();
    assert_eq!(discord.state, AdapterState::Online);
}
