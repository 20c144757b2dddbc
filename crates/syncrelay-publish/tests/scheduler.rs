// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publication queue and scheduler behavior against a temp SQLite database.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use syncrelay_config::model::SchedulerConfig;
use syncrelay_core::{
    CatalogStore, NewMediaAsset, NewPublication, Platform, PublicationStatus, PublicationStore,
    RelayError,
};
use syncrelay_publish::{PublicationScheduler, TickReport};
use syncrelay_test_utils::TestHarness;

fn asap(preset_id: i64) -> NewPublication {
    NewPublication {
        preset_id,
        title: Some("Weekly recap".into()),
        ..NewPublication::default()
    }
}

fn at(preset_id: i64, offset: ChronoDuration) -> NewPublication {
    NewPublication {
        scheduled_at: Some(Utc::now() + offset),
        ..asap(preset_id)
    }
}

#[tokio::test]
async fn unscheduled_job_is_published_after_one_tick() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();

    let job = harness.queue.create(&asap(preset.id)).await.unwrap();
    assert_eq!(job.status, PublicationStatus::Queued);
    assert!(job.scheduled_at.is_none());

    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(report.published, 1);

    let job = harness.queue.get(job.id).await.unwrap();
    assert_eq!(job.status, PublicationStatus::Published);
    assert!(job.published_at.is_some());
    assert_eq!(
        job.result.get("external_id").and_then(|v| v.as_str()),
        Some(format!("p{}", job.id).as_str())
    );

    let publishes = harness.dispatcher.publishes().await;
    assert_eq!(publishes.len(), 1);
    assert_eq!(publishes[0].preset.name, "yt-main");
    assert_eq!(publishes[0].title.as_deref(), Some("Weekly recap"));
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn future_job_waits_as_draft() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();

    let job = harness
        .queue
        .create(&at(preset.id, ChronoDuration::hours(1)))
        .await
        .unwrap();
    assert_eq!(job.status, PublicationStatus::Draft);

    let report = harness.scheduler.tick().await.unwrap();
    assert!(report.is_idle());
    assert_eq!(
        harness.queue.get(job.id).await.unwrap().status,
        PublicationStatus::Draft
    );

    // Promotion only makes it Queued; it is still not due.
    let promoted = harness.queue.promote(job.id).await.unwrap();
    assert_eq!(promoted.status, PublicationStatus::Queued);
    harness.scheduler.tick().await.unwrap();
    assert_eq!(
        harness.queue.get(job.id).await.unwrap().status,
        PublicationStatus::Queued
    );
    assert!(harness.dispatcher.publishes().await.is_empty());
}

#[tokio::test]
async fn elapsed_draft_is_promoted_and_published() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("rt", Platform::Rutube).await.unwrap();
    let draft = harness
        .storage
        .insert_publication(
            &at(preset.id, ChronoDuration::minutes(-5)),
            PublicationStatus::Draft,
        )
        .await
        .unwrap();

    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(
        report,
        TickReport {
            expired: 0,
            promoted: 1,
            published: 1,
            failed: 0
        }
    );
    assert_eq!(
        harness.queue.get(draft.id).await.unwrap().status,
        PublicationStatus::Published
    );
}

#[tokio::test]
async fn draft_promotion_can_be_disabled() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            promote_due_drafts: false,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let preset = harness.preset("rt", Platform::Rutube).await.unwrap();
    let draft = harness
        .storage
        .insert_publication(
            &at(preset.id, ChronoDuration::minutes(-5)),
            PublicationStatus::Draft,
        )
        .await
        .unwrap();

    assert!(harness.scheduler.tick().await.unwrap().is_idle());
    assert_eq!(
        harness.queue.get(draft.id).await.unwrap().status,
        PublicationStatus::Draft
    );
}

#[tokio::test]
async fn create_validates_references() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness.queue.create(&asap(42)).await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound { entity: "preset", .. }));

    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let err = harness
        .queue
        .create(&NewPublication {
            media_id: Some(7),
            ..asap(preset.id)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::NotFound { entity: "media", .. }));

    let media = harness
        .storage
        .insert_media(&NewMediaAsset {
            filename: "a1b2.mp4".into(),
            original_filename: "recap.mp4".into(),
            file_path: "/uploads/a1b2.mp4".into(),
            file_type: "video".into(),
            file_size: 2_048,
            mime_type: Some("video/mp4".into()),
        })
        .await
        .unwrap();
    let job = harness
        .queue
        .create(&NewPublication {
            media_id: Some(media.id),
            ..asap(preset.id)
        })
        .await
        .unwrap();
    harness.scheduler.tick().await.unwrap();
    let publishes = harness.dispatcher.publishes().await;
    assert_eq!(publishes[0].job_id, job.id);
    assert_eq!(
        publishes[0].media.as_ref().map(|m| m.original_filename.as_str()),
        Some("recap.mp4")
    );
}

#[tokio::test]
async fn failed_job_stays_failed_until_requeued() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();
    harness.dispatcher.fail_next(1, "quota exceeded").await;

    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(report.failed, 1);
    let failed = harness.queue.get(job.id).await.unwrap();
    assert_eq!(failed.status, PublicationStatus::Failed);
    assert!(
        failed
            .error_message
            .as_deref()
            .is_some_and(|e| e.contains("quota exceeded"))
    );

    // No automatic retry.
    assert!(harness.scheduler.tick().await.unwrap().is_idle());

    let requeued = harness.queue.requeue(job.id).await.unwrap();
    assert_eq!(requeued.status, PublicationStatus::Queued);
    assert!(requeued.error_message.is_none());

    harness.scheduler.tick().await.unwrap();
    let published = harness.queue.get(job.id).await.unwrap();
    assert_eq!(published.status, PublicationStatus::Published);

    let err = harness.queue.requeue(job.id).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidState { .. }));
    let err = harness.queue.promote(job.id).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidState { .. }));
}

#[tokio::test]
async fn deleted_preset_fails_the_job() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("gone", Platform::Twitch).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();
    harness.storage.delete_preset(preset.id).await.unwrap();

    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(report.failed, 1);
    let job = harness.queue.get(job.id).await.unwrap();
    assert_eq!(job.status, PublicationStatus::Failed);
    assert!(job.error_message.unwrap().contains("not found"));
    assert!(harness.dispatcher.publishes().await.is_empty());
}

#[tokio::test]
async fn slow_publish_times_out() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            publish_timeout_secs: 1,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();
    harness
        .dispatcher
        .set_delay(Some(Duration::from_secs(3)))
        .await;

    harness.scheduler.tick().await.unwrap();
    let job = harness.queue.get(job.id).await.unwrap();
    assert_eq!(job.status, PublicationStatus::Failed);
    assert!(job.error_message.unwrap().contains("timed out"));
}

#[tokio::test]
async fn jobs_dispatch_in_due_order() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            workers: 1,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();

    let minus_1 = harness
        .queue
        .create(&at(preset.id, ChronoDuration::minutes(-1)))
        .await
        .unwrap();
    let now = harness.queue.create(&asap(preset.id)).await.unwrap();
    let minus_3 = harness
        .queue
        .create(&at(preset.id, ChronoDuration::minutes(-3)))
        .await
        .unwrap();
    let minus_2 = harness
        .queue
        .create(&at(preset.id, ChronoDuration::minutes(-2)))
        .await
        .unwrap();

    harness.scheduler.tick().await.unwrap();
    let order: Vec<i64> = harness
        .dispatcher
        .publishes()
        .await
        .iter()
        .map(|r| r.job_id)
        .collect();
    assert_eq!(order, vec![minus_3.id, minus_2.id, minus_1.id, now.id]);
}

#[tokio::test]
async fn competing_schedulers_publish_each_job_once() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            workers: 3,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    for _ in 0..12 {
        harness.queue.create(&asap(preset.id)).await.unwrap();
    }

    // A second instance sharing the same database.
    let rival = Arc::new(PublicationScheduler::new(
        &harness.config.scheduler,
        harness.storage.clone(),
        harness.storage.clone(),
        harness.dispatcher.clone(),
    ));
    let ours = Arc::clone(&harness.scheduler);
    let (a, b) = tokio::join!(ours.tick(), rival.tick());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.published + b.published, 12);

    let ids: Vec<i64> = harness
        .dispatcher
        .publishes()
        .await
        .iter()
        .map(|r| r.job_id)
        .collect();
    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 12);
    assert_eq!(unique.len(), 12);
}

#[tokio::test]
async fn list_and_delete() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let first = harness.queue.create(&asap(preset.id)).await.unwrap();
    let second = harness
        .queue
        .create(&at(preset.id, ChronoDuration::days(1)))
        .await
        .unwrap();

    let all = harness.queue.list(None, 10).await.unwrap();
    assert_eq!(
        all.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    let drafts = harness
        .queue
        .list(Some(PublicationStatus::Draft), 10)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);

    harness.queue.delete(second.id).await.unwrap();
    assert!(matches!(
        harness.queue.get(second.id).await.unwrap_err(),
        RelayError::NotFound { .. }
    ));
    let counts = harness.queue.counts().await.unwrap();
    assert_eq!(counts, vec![(PublicationStatus::Queued, 1)]);
}

#[tokio::test]
async fn delete_refuses_job_claimed_by_a_worker() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();

    // Another instance takes the job between the operator's read and delete.
    let claimed = harness
        .storage
        .claim_next_publication(Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, job.id);

    let err = harness.queue.delete(job.id).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::InvalidState { ref from, .. } if from == "publishing"
    ));
    assert_eq!(
        harness.queue.get(job.id).await.unwrap().status,
        PublicationStatus::Publishing
    );
    assert!(matches!(
        harness.queue.delete(9_999).await.unwrap_err(),
        RelayError::NotFound { .. }
    ));
}

#[tokio::test]
async fn abandoned_claim_is_failed_and_can_be_requeued() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            // Every existing claim counts as abandoned.
            publish_lease_secs: 0,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();

    // A worker claims the job and dies before resolving it.
    harness
        .storage
        .claim_next_publication(Utc::now())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.published, 0);
    let stuck = harness.queue.get(job.id).await.unwrap();
    assert_eq!(stuck.status, PublicationStatus::Failed);
    assert_eq!(stuck.error_message.as_deref(), Some("publish claim expired"));
    assert!(harness.dispatcher.publishes().await.is_empty());

    harness.queue.requeue(job.id).await.unwrap();
    let report = harness.scheduler.tick().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(
        harness.queue.get(job.id).await.unwrap().status,
        PublicationStatus::Published
    );
}

#[tokio::test]
async fn lost_claim_is_not_reported_as_published() {
    let harness = TestHarness::builder().build().await.unwrap();
    let preset = harness.preset("yt-main", Platform::Youtube).await.unwrap();
    let job = harness.queue.create(&asap(preset.id)).await.unwrap();
    harness
        .dispatcher
        .set_delay(Some(Duration::from_millis(300)))
        .await;

    let tick = {
        let scheduler = Arc::clone(&harness.scheduler);
        tokio::spawn(async move { scheduler.tick().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The claim is released underneath the worker while it is publishing.
    let released = harness
        .storage
        .release_expired_claims(Utc::now() + ChronoDuration::hours(1), "publish claim expired")
        .await
        .unwrap();
    assert_eq!(released, 1);

    let report = tick.await.unwrap().unwrap();
    assert_eq!(report.published, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(harness.dispatcher.publishes().await.len(), 1);
    let job = harness.queue.get(job.id).await.unwrap();
    assert_eq!(job.status, PublicationStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("publish claim expired"));
    assert!(job.published_at.is_none());
}
