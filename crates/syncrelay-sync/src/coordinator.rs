// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event handling and the sync record state machine.
//!
//! Each event passes the inbound rate guard, loop suppression and pairing
//! resolution before the ledger is touched. Work on one source message is
//! serialized by an in-process keyed lock, and status moves are
//! compare-and-swap updates in the ledger, so two processes racing on the
//! same record cannot both dispatch it. A revision that arrives while another
//! worker holds the record in Syncing is stored on the record, and that
//! worker sends it once its own dispatch completes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use syncrelay_config::model::SyncConfig;
use syncrelay_core::{
    AdapterDispatcher, EventAction, InboundEvent, NewSyncRecord, Platform, RelayError,
    SyncLedger, SyncRecord, SyncStatus,
};
use syncrelay_guard::RateGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::locks::KeyedLocks;
use crate::registry::ChannelRegistry;
use crate::retry::RetryPolicy;

/// Records retried concurrently by one sweep.
const RETRY_CONCURRENCY: usize = 4;

/// What happened to one inbound event or retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new message was posted on the counterpart channel.
    Relayed {
        record_id: i64,
        paired_message_id: String,
    },
    /// The previously relayed message was updated in place.
    Edited {
        record_id: i64,
        paired_message_id: String,
    },
    /// Same content as an already completed record; nothing was sent.
    Unchanged { record_id: i64 },
    /// The dispatcher failed; the reason is stored on the record.
    Failed {
        record_id: i64,
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    },
    /// The event echoes a message this service posted itself.
    LoopSuppressed { record_id: i64 },
    /// No active pairing covers the source channel.
    NoSyncConfig,
    /// The source channel exceeded its inbound limit. Nothing was stored.
    Throttled,
    /// Another worker holds the record in Syncing.
    InFlight { record_id: i64 },
}

/// Result of staging an event on the ledger.
enum Staged {
    /// The record is Pending or Failed and may be dispatched.
    Ready(SyncRecord),
    /// Another worker owns the record.
    Claimed(SyncOutcome),
}

pub struct SyncCoordinator {
    registry: Arc<ChannelRegistry>,
    ledger: Arc<dyn SyncLedger>,
    dispatcher: Arc<dyn AdapterDispatcher>,
    guard: RateGuard,
    locks: KeyedLocks,
    retry: RetryPolicy,
    dispatch_timeout: Duration,
    loop_window: chrono::Duration,
    retry_batch_size: usize,
}

fn source_key(platform: Platform, message_id: &str) -> String {
    format!("{platform}:{message_id}")
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365))
}

impl SyncCoordinator {
    pub fn new(
        config: &SyncConfig,
        registry: Arc<ChannelRegistry>,
        ledger: Arc<dyn SyncLedger>,
        dispatcher: Arc<dyn AdapterDispatcher>,
        guard: RateGuard,
    ) -> Self {
        Self {
            registry,
            ledger,
            dispatcher,
            guard,
            locks: KeyedLocks::new(),
            retry: RetryPolicy::from_config(config),
            dispatch_timeout: config.dispatch_timeout(),
            loop_window: to_chrono(config.loop_window()),
            retry_batch_size: config.retry_batch_size,
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs one inbound event through the sync pipeline.
    ///
    /// Dispatcher failures and timeouts are recorded on the sync record and
    /// reported as [`SyncOutcome::Failed`]; only storage problems surface as
    /// errors.
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<SyncOutcome, RelayError> {
        let channel = format!("{}:{}", event.platform, event.channel_id);
        match self.guard.try_acquire(&channel).await {
            Ok(()) => {}
            Err(RelayError::Throttled { .. }) => {
                warn!(
                    platform = %event.platform,
                    channel_id = %event.channel_id,
                    message_id = %event.native_message_id,
                    "inbound event dropped by rate guard"
                );
                return Ok(SyncOutcome::Throttled);
            }
            Err(e) => return Err(e),
        }

        if let Some(origin) = self
            .ledger
            .find_by_target(event.platform, &event.native_message_id)
            .await?
        {
            if Utc::now() - origin.updated_at <= self.loop_window {
                debug!(
                    platform = %event.platform,
                    message_id = %event.native_message_id,
                    record_id = origin.id,
                    "ignoring echo of relayed message"
                );
                return Ok(SyncOutcome::LoopSuppressed {
                    record_id: origin.id,
                });
            }
        }

        let Some(pairing) = self
            .registry
            .find_pairing(event.platform, &event.channel_id)
            .await?
        else {
            debug!(
                platform = %event.platform,
                channel_id = %event.channel_id,
                "no active pairing for channel"
            );
            return Ok(SyncOutcome::NoSyncConfig);
        };
        let Some((target_platform, target_channel)) =
            pairing.counterpart(event.platform, &event.channel_id)
        else {
            return Ok(SyncOutcome::NoSyncConfig);
        };

        let _lock = self
            .locks
            .lock(source_key(event.platform, &event.native_message_id))
            .await;

        let existing = self
            .ledger
            .find_by_source(event.platform, &event.native_message_id)
            .await?;
        match &existing {
            Some(record)
                if record.status == SyncStatus::Completed
                    && record.pairing_id == Some(pairing.id)
                    && record.paired_platform == target_platform
                    && record.paired_channel_id == target_channel
                    && record.content == event.content
                    && record.metadata == event.metadata =>
            {
                debug!(record_id = record.id, "duplicate delivery ignored");
                return Ok(SyncOutcome::Unchanged {
                    record_id: record.id,
                });
            }
            None if event.action == EventAction::Edit => {
                debug!(
                    platform = %event.platform,
                    message_id = %event.native_message_id,
                    "edit for an unknown message, relaying it as new"
                );
            }
            _ => {}
        }

        let staged = NewSyncRecord {
            pairing_id: pairing.id,
            source_platform: event.platform,
            source_channel_id: event.channel_id.clone(),
            source_message_id: event.native_message_id.clone(),
            paired_platform: target_platform,
            paired_channel_id: target_channel.to_string(),
            content: event.content.clone(),
            metadata: event.metadata.clone(),
        };
        match self.stage(&staged).await? {
            Staged::Ready(record) => self.dispatch_until_settled(record).await,
            Staged::Claimed(outcome) => Ok(outcome),
        }
    }

    /// Retries Failed records whose backoff has elapsed.
    pub async fn retry_due(&self) -> Result<Vec<SyncOutcome>, RelayError> {
        let due = self
            .ledger
            .due_retries(Utc::now(), self.retry.max_attempts, self.retry_batch_size)
            .await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = due.len(), "retrying failed sync records");

        let results: Vec<(i64, Result<SyncOutcome, RelayError>)> = futures::stream::iter(due)
            .map(|record| async move { (record.id, self.retry_locked(record.id).await) })
            .buffer_unordered(RETRY_CONCURRENCY)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(results.len());
        for (record_id, result) in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                // Re-opened by an edit between selection and lock.
                Err(RelayError::InvalidState { .. }) => {
                    debug!(record_id, "record changed before retry, skipped");
                }
                Err(e) => error!(record_id, error = %e, "sync retry failed"),
            }
        }
        Ok(outcomes)
    }

    /// Operator retry of a Failed record, regardless of its attempt count.
    pub async fn retry_record(&self, id: i64) -> Result<SyncOutcome, RelayError> {
        self.retry_locked(id).await
    }

    pub async fn get_record(&self, id: i64) -> Result<SyncRecord, RelayError> {
        self.ledger
            .get_sync_record(id)
            .await?
            .ok_or_else(|| RelayError::not_found("sync record", id))
    }

    /// Newest first, optionally filtered by status.
    pub async fn list_records(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncRecord>, RelayError> {
        self.ledger.list_sync_records(status, limit).await
    }

    pub async fn delete_record(&self, id: i64) -> Result<(), RelayError> {
        let record = self.get_record(id).await?;
        let _lock = self
            .locks
            .lock(source_key(record.source_platform, &record.source_message_id))
            .await;
        self.ledger.delete_sync_record(id).await?;
        info!(record_id = id, "sync record deleted");
        Ok(())
    }

    /// Sweeps due retries every `interval` until `cancel` fires.
    pub async fn run_retry_sweeper(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.retry_due().await {
                        Ok(outcomes) if !outcomes.is_empty() => {
                            info!(retried = outcomes.len(), "sync retry sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "sync retry sweep failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping sync retry sweeper");
                    break;
                }
            }
        }
    }

    async fn retry_locked(&self, id: i64) -> Result<SyncOutcome, RelayError> {
        let record = self.get_record(id).await?;
        let _lock = self
            .locks
            .lock(source_key(record.source_platform, &record.source_message_id))
            .await;
        let record = self.get_record(id).await?;
        if record.status != SyncStatus::Failed {
            return Err(RelayError::InvalidState {
                entity: "sync record",
                id,
                from: record.status.to_string(),
                to: SyncStatus::Syncing.to_string(),
            });
        }

        match self.current_target(&record).await? {
            Some(staged)
                if staged.paired_platform == record.paired_platform
                    && staged.paired_channel_id == record.paired_channel_id =>
            {
                self.dispatch_until_settled(record).await
            }
            // The pairing was re-pointed since the failed attempt.
            Some(staged) => match self.stage(&staged).await? {
                Staged::Ready(record) => self.dispatch_until_settled(record).await,
                Staged::Claimed(outcome) => Ok(outcome),
            },
            None => {
                // Failing the attempt clears the retry schedule.
                if self
                    .ledger
                    .mark_status(id, SyncStatus::Syncing, None, None)
                    .await?
                {
                    self.ledger
                        .mark_status(
                            id,
                            SyncStatus::Failed,
                            None,
                            Some("no active pairing for source channel"),
                        )
                        .await?;
                }
                warn!(record_id = id, "retry abandoned, source channel is no longer paired");
                Ok(SyncOutcome::NoSyncConfig)
            }
        }
    }

    /// The record as it would be staged now: its current content routed
    /// through whatever pairing covers the source channel today.
    async fn current_target(
        &self,
        record: &SyncRecord,
    ) -> Result<Option<NewSyncRecord>, RelayError> {
        let Some(pairing) = self
            .registry
            .find_pairing(record.source_platform, &record.source_channel_id)
            .await?
        else {
            return Ok(None);
        };
        Ok(pairing
            .counterpart(record.source_platform, &record.source_channel_id)
            .map(|(platform, channel)| NewSyncRecord {
                pairing_id: pairing.id,
                source_platform: record.source_platform,
                source_channel_id: record.source_channel_id.clone(),
                source_message_id: record.source_message_id.clone(),
                paired_platform: platform,
                paired_channel_id: channel.to_string(),
                content: record.content.clone(),
                metadata: record.metadata.clone(),
            }))
    }

    /// Upserts the ledger row. A row another worker holds in Syncing only
    /// takes the new content and is reported as in flight.
    async fn stage(&self, staged: &NewSyncRecord) -> Result<Staged, RelayError> {
        let (record, created) = self.ledger.upsert_sync_record(staged).await?;
        debug!(
            record_id = record.id,
            created,
            status = %record.status,
            "sync record staged"
        );
        if record.status == SyncStatus::Syncing {
            debug!(
                record_id = record.id,
                "record is being synced elsewhere, newer content left for its owner"
            );
            return Ok(Staged::Claimed(SyncOutcome::InFlight {
                record_id: record.id,
            }));
        }
        Ok(Staged::Ready(record))
    }

    /// Dispatches `record`, then keeps sending newer revisions that were
    /// stored on it while the dispatch was in flight.
    async fn dispatch_until_settled(
        &self,
        mut record: SyncRecord,
    ) -> Result<SyncOutcome, RelayError> {
        loop {
            let outcome = self.dispatch(&record).await?;
            if !matches!(
                outcome,
                SyncOutcome::Relayed { .. } | SyncOutcome::Edited { .. }
            ) {
                return Ok(outcome);
            }
            let Some(current) = self.ledger.get_sync_record(record.id).await? else {
                return Ok(outcome);
            };
            if current.status != SyncStatus::Completed
                || (current.content == record.content && current.metadata == record.metadata)
            {
                return Ok(outcome);
            }
            debug!(
                record_id = record.id,
                "content changed while syncing, sending the newer revision"
            );
            let Some(staged) = self.current_target(&current).await? else {
                return Ok(outcome);
            };
            match self.stage(&staged).await? {
                Staged::Ready(next) => record = next,
                Staged::Claimed(_) => return Ok(outcome),
            }
        }
    }

    /// Syncing, one dispatcher call, then Completed or Failed. Caller holds the key lock.
    ///
    /// Edits go to the stored paired message; the ledger forgets that id
    /// whenever the record is re-staged for a different channel.
    async fn dispatch(&self, record: &SyncRecord) -> Result<SyncOutcome, RelayError> {
        if !self
            .ledger
            .mark_status(record.id, SyncStatus::Syncing, None, None)
            .await?
        {
            debug!(record_id = record.id, "record is already being synced");
            return Ok(SyncOutcome::InFlight {
                record_id: record.id,
            });
        }
        let attempts = record.attempts + 1;
        let target_platform = record.paired_platform;

        let call = async {
            match record.paired_message_id.as_deref() {
                Some(paired) => self
                    .dispatcher
                    .edit_relay(target_platform, paired, &record.content)
                    .await
                    .map(|()| (paired.to_string(), true)),
                None => self
                    .dispatcher
                    .relay(
                        target_platform,
                        &record.paired_channel_id,
                        &record.content,
                        &record.metadata,
                    )
                    .await
                    .map(|id| (id.0, false)),
            }
        };
        let result = match tokio::time::timeout(self.dispatch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                duration: self.dispatch_timeout,
            }),
        };

        match result {
            Ok((paired_message_id, edited)) => {
                let applied = self
                    .ledger
                    .mark_status(
                        record.id,
                        SyncStatus::Completed,
                        Some(&paired_message_id),
                        None,
                    )
                    .await?;
                if !applied {
                    warn!(
                        record_id = record.id,
                        "record removed while dispatching, completion not stored"
                    );
                }
                info!(
                    record_id = record.id,
                    source_platform = %record.source_platform,
                    target_platform = %target_platform,
                    paired_message_id = %paired_message_id,
                    edited,
                    "message synced"
                );
                Ok(if edited {
                    SyncOutcome::Edited {
                        record_id: record.id,
                        paired_message_id,
                    }
                } else {
                    SyncOutcome::Relayed {
                        record_id: record.id,
                        paired_message_id,
                    }
                })
            }
            Err(e) => self.record_failure(record.id, attempts, &e).await,
        }
    }

    async fn record_failure(
        &self,
        record_id: i64,
        attempts: u32,
        error: &RelayError,
    ) -> Result<SyncOutcome, RelayError> {
        let reason = error.to_string();
        self.ledger
            .mark_status(record_id, SyncStatus::Failed, None, Some(&reason))
            .await?;
        // Misconfiguration does not heal by waiting; only adapter failures are retried.
        let retry_at = if error.is_dispatch_failure() && self.retry.allows_retry(attempts) {
            let at = Utc::now() + to_chrono(self.retry.delay_after(attempts));
            self.ledger.schedule_retry(record_id, at).await?;
            Some(at)
        } else {
            None
        };
        warn!(
            record_id,
            attempts,
            error = %reason,
            retry_at = ?retry_at,
            "sync dispatch failed"
        );
        Ok(SyncOutcome::Failed {
            record_id,
            reason,
            retry_at,
        })
    }
}
