// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for pairings, the sync ledger, and the publication queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AdapterReport, ChannelPairing, MediaAsset, Metadata, NewMediaAsset, NewPairing, NewPreset,
    NewPublication, NewSyncRecord, Platform, Preset, PublicationJob, PublicationStatus,
    SyncRecord, SyncStatus,
};

/// Lifecycle of a persistence backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RelayError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RelayError>;
}

/// Channel pairing table.
///
/// `(platform, channel_id)` is unique across both endpoints of all active
/// pairings; violating writes fail with [`RelayError::Conflict`].
#[async_trait]
pub trait PairingStore: Send + Sync {
    async fn insert_pairing(&self, pairing: &NewPairing) -> Result<ChannelPairing, RelayError>;

    async fn update_pairing(
        &self,
        id: i64,
        pairing: &NewPairing,
    ) -> Result<ChannelPairing, RelayError>;

    async fn set_pairing_active(&self, id: i64, active: bool)
    -> Result<ChannelPairing, RelayError>;

    /// Deletes the pairing. Ledger rows keep their history with a null pairing reference.
    async fn delete_pairing(&self, id: i64) -> Result<(), RelayError>;

    async fn get_pairing(&self, id: i64) -> Result<Option<ChannelPairing>, RelayError>;

    async fn list_pairings(&self) -> Result<Vec<ChannelPairing>, RelayError>;
}

/// Durable record of every sync attempt, unique on the source message.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    async fn find_by_source(
        &self,
        platform: Platform,
        message_id: &str,
    ) -> Result<Option<SyncRecord>, RelayError>;

    /// Finds the record whose relay produced `message_id` on `platform`.
    async fn find_by_target(
        &self,
        platform: Platform,
        message_id: &str,
    ) -> Result<Option<SyncRecord>, RelayError>;

    async fn get_sync_record(&self, id: i64) -> Result<Option<SyncRecord>, RelayError>;

    /// Inserts a Pending record, or refreshes content and metadata of the
    /// existing record for the same source and moves it back to Pending.
    ///
    /// A record currently in Syncing keeps its status; only its content and
    /// metadata change. A changed paired channel forgets the paired message id.
    ///
    /// Returns the stored record and whether it was newly created.
    async fn upsert_sync_record(
        &self,
        record: &NewSyncRecord,
    ) -> Result<(SyncRecord, bool), RelayError>;

    /// Moves the record to `status` if its current status is a legal predecessor.
    ///
    /// Moving to Syncing counts a dispatch attempt. `paired_message_id` is kept
    /// when `None`. Returns `false` when the transition was not applied.
    async fn mark_status(
        &self,
        id: i64,
        status: SyncStatus,
        paired_message_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool, RelayError>;

    async fn schedule_retry(&self, id: i64, at: DateTime<Utc>) -> Result<(), RelayError>;

    /// Failed records whose retry time has passed and that still have attempts left.
    async fn due_retries(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> Result<Vec<SyncRecord>, RelayError>;

    async fn list_sync_records(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncRecord>, RelayError>;

    async fn delete_sync_record(&self, id: i64) -> Result<(), RelayError>;
}

/// Publication queue table.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    async fn insert_publication(
        &self,
        publication: &NewPublication,
        status: PublicationStatus,
    ) -> Result<PublicationJob, RelayError>;

    async fn get_publication(&self, id: i64) -> Result<Option<PublicationJob>, RelayError>;

    /// Newest first, optionally filtered by status.
    async fn list_publications(
        &self,
        status: Option<PublicationStatus>,
        limit: usize,
    ) -> Result<Vec<PublicationJob>, RelayError>;

    /// Deletes a job unless a worker holds it in Publishing, which fails
    /// with [`RelayError::InvalidState`].
    async fn delete_publication(&self, id: i64) -> Result<(), RelayError>;

    /// Single-row conditional update `from -> to`. Returns `false` if the job
    /// was no longer in `from`.
    async fn transition_publication(
        &self,
        id: i64,
        from: PublicationStatus,
        to: PublicationStatus,
    ) -> Result<bool, RelayError>;

    /// Moves every Draft whose schedule has elapsed to Queued.
    async fn promote_due_drafts(&self, now: DateTime<Utc>) -> Result<u64, RelayError>;

    /// Claims the earliest due Queued job, by due time then creation order.
    async fn claim_next_publication(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicationJob>, RelayError>;

    /// Publishing -> Failed for every job claimed before `claimed_before`.
    /// Returns how many were released.
    async fn release_expired_claims(
        &self,
        claimed_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, RelayError>;

    /// Publishing -> Published.
    async fn complete_publication(
        &self,
        id: i64,
        result: &Metadata,
        published_at: DateTime<Utc>,
    ) -> Result<bool, RelayError>;

    /// Publishing -> Failed.
    async fn fail_publication(&self, id: i64, error: &str) -> Result<bool, RelayError>;

    async fn count_publications(&self) -> Result<Vec<(PublicationStatus, u64)>, RelayError>;
}

/// Presets and media metadata referenced by publications.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_preset(&self, preset: &NewPreset) -> Result<Preset, RelayError>;

    async fn update_preset(&self, id: i64, preset: &NewPreset) -> Result<Preset, RelayError>;

    async fn get_preset(&self, id: i64) -> Result<Option<Preset>, RelayError>;

    async fn list_presets(&self) -> Result<Vec<Preset>, RelayError>;

    async fn delete_preset(&self, id: i64) -> Result<(), RelayError>;

    async fn insert_media(&self, media: &NewMediaAsset) -> Result<MediaAsset, RelayError>;

    async fn get_media(&self, id: i64) -> Result<Option<MediaAsset>, RelayError>;
}

/// Last liveness report per platform adapter.
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn record_report(&self, report: &AdapterReport) -> Result<(), RelayError>;

    async fn list_reports(&self) -> Result<Vec<AdapterReport>, RelayError>;
}
