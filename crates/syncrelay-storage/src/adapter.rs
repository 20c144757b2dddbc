// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and counter traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use syncrelay_config::model::StorageConfig;
use syncrelay_core::{
    AdapterReport, AdapterType, CatalogStore, ChannelPairing, CounterStore, HealthStatus,
    HealthStore, MediaAsset, Metadata, NewMediaAsset, NewPairing, NewPreset, NewPublication,
    NewSyncRecord, PairingStore, Platform, PluginAdapter, Preset, PublicationJob,
    PublicationStatus, PublicationStore, RelayError, StorageAdapter, SyncLedger, SyncRecord,
    SyncStatus,
};

use crate::database::{self, Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates to the query modules. The
/// database is opened by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create the adapter. Nothing is opened until [`initialize`](StorageAdapter::initialize).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RelayError> {
        self.db.get().ok_or_else(|| RelayError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.query_row("SELECT 1", [], |_| Ok(())) })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        if let Some(db) = self.db.get() {
            database::checkpoint(db.connection()).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), RelayError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RelayError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        database::checkpoint(self.db()?.connection()).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PairingStore for SqliteStorage {
    async fn insert_pairing(&self, pairing: &NewPairing) -> Result<ChannelPairing, RelayError> {
        queries::pairings::insert_pairing(self.db()?, pairing).await
    }

    async fn update_pairing(
        &self,
        id: i64,
        pairing: &NewPairing,
    ) -> Result<ChannelPairing, RelayError> {
        queries::pairings::update_pairing(self.db()?, id, pairing).await
    }

    async fn set_pairing_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<ChannelPairing, RelayError> {
        queries::pairings::set_pairing_active(self.db()?, id, active).await
    }

    async fn delete_pairing(&self, id: i64) -> Result<(), RelayError> {
        queries::pairings::delete_pairing(self.db()?, id).await
    }

    async fn get_pairing(&self, id: i64) -> Result<Option<ChannelPairing>, RelayError> {
        queries::pairings::get_pairing(self.db()?, id).await
    }

    async fn list_pairings(&self) -> Result<Vec<ChannelPairing>, RelayError> {
        queries::pairings::list_pairings(self.db()?).await
    }
}

#[async_trait]
impl SyncLedger for SqliteStorage {
    async fn find_by_source(
        &self,
        platform: Platform,
        message_id: &str,
    ) -> Result<Option<SyncRecord>, RelayError> {
        queries::sync_records::find_by_source(self.db()?, platform, message_id).await
    }

    async fn find_by_target(
        &self,
        platform: Platform,
        message_id: &str,
    ) -> Result<Option<SyncRecord>, RelayError> {
        queries::sync_records::find_by_target(self.db()?, platform, message_id).await
    }

    async fn get_sync_record(&self, id: i64) -> Result<Option<SyncRecord>, RelayError> {
        queries::sync_records::get_sync_record(self.db()?, id).await
    }

    async fn upsert_sync_record(
        &self,
        record: &NewSyncRecord,
    ) -> Result<(SyncRecord, bool), RelayError> {
        queries::sync_records::upsert_sync_record(self.db()?, record).await
    }

    async fn mark_status(
        &self,
        id: i64,
        status: SyncStatus,
        paired_message_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool, RelayError> {
        queries::sync_records::mark_status(self.db()?, id, status, paired_message_id, error).await
    }

    async fn schedule_retry(&self, id: i64, at: DateTime<Utc>) -> Result<(), RelayError> {
        queries::sync_records::schedule_retry(self.db()?, id, at).await
    }

    async fn due_retries(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> Result<Vec<SyncRecord>, RelayError> {
        queries::sync_records::due_retries(self.db()?, now, max_attempts, limit).await
    }

    async fn list_sync_records(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncRecord>, RelayError> {
        queries::sync_records::list_sync_records(self.db()?, status, limit).await
    }

    async fn delete_sync_record(&self, id: i64) -> Result<(), RelayError> {
        queries::sync_records::delete_sync_record(self.db()?, id).await
    }
}

#[async_trait]
impl PublicationStore for SqliteStorage {
    async fn insert_publication(
        &self,
        publication: &NewPublication,
        status: PublicationStatus,
    ) -> Result<PublicationJob, RelayError> {
        queries::publications::insert_publication(self.db()?, publication, status).await
    }

    async fn get_publication(&self, id: i64) -> Result<Option<PublicationJob>, RelayError> {
        queries::publications::get_publication(self.db()?, id).await
    }

    async fn list_publications(
        &self,
        status: Option<PublicationStatus>,
        limit: usize,
    ) -> Result<Vec<PublicationJob>, RelayError> {
        queries::publications::list_publications(self.db()?, status, limit).await
    }

    async fn delete_publication(&self, id: i64) -> Result<(), RelayError> {
        queries::publications::delete_publication(self.db()?, id).await
    }

    async fn transition_publication(
        &self,
        id: i64,
        from: PublicationStatus,
        to: PublicationStatus,
    ) -> Result<bool, RelayError> {
        queries::publications::transition_publication(self.db()?, id, from, to).await
    }

    async fn promote_due_drafts(&self, now: DateTime<Utc>) -> Result<u64, RelayError> {
        queries::publications::promote_due_drafts(self.db()?, now).await
    }

    async fn release_expired_claims(
        &self,
        claimed_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, RelayError> {
        queries::publications::release_expired_claims(self.db()?, claimed_before, reason).await
    }

    async fn claim_next_publication(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicationJob>, RelayError> {
        queries::publications::claim_next_publication(self.db()?, now).await
    }

    async fn complete_publication(
        &self,
        id: i64,
        result: &Metadata,
        published_at: DateTime<Utc>,
    ) -> Result<bool, RelayError> {
        queries::publications::complete_publication(self.db()?, id, result, published_at).await
    }

    async fn fail_publication(&self, id: i64, error: &str) -> Result<bool, RelayError> {
        queries::publications::fail_publication(self.db()?, id, error).await
    }

    async fn count_publications(&self) -> Result<Vec<(PublicationStatus, u64)>, RelayError> {
        queries::publications::count_publications(self.db()?).await
    }
}

#[async_trait]
impl CatalogStore for SqliteStorage {
    async fn insert_preset(&self, preset: &NewPreset) -> Result<Preset, RelayError> {
        queries::catalog::insert_preset(self.db()?, preset).await
    }

    async fn update_preset(&self, id: i64, preset: &NewPreset) -> Result<Preset, RelayError> {
        queries::catalog::update_preset(self.db()?, id, preset).await
    }

    async fn get_preset(&self, id: i64) -> Result<Option<Preset>, RelayError> {
        queries::catalog::get_preset(self.db()?, id).await
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, RelayError> {
        queries::catalog::list_presets(self.db()?).await
    }

    async fn delete_preset(&self, id: i64) -> Result<(), RelayError> {
        queries::catalog::delete_preset(self.db()?, id).await
    }

    async fn insert_media(&self, media: &NewMediaAsset) -> Result<MediaAsset, RelayError> {
        queries::catalog::insert_media(self.db()?, media).await
    }

    async fn get_media(&self, id: i64) -> Result<Option<MediaAsset>, RelayError> {
        queries::catalog::get_media(self.db()?, id).await
    }
}

#[async_trait]
impl HealthStore for SqliteStorage {
    async fn record_report(&self, report: &AdapterReport) -> Result<(), RelayError> {
        queries::health::record_report(self.db()?, report).await
    }

    async fn list_reports(&self) -> Result<Vec<AdapterReport>, RelayError> {
        queries::health::list_reports(self.db()?).await
    }
}

#[async_trait]
impl CounterStore for SqliteStorage {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, RelayError> {
        queries::counters::increment(self.db()?, key, window).await
    }

    async fn count(&self, key: &str, window: Duration) -> Result<u64, RelayError> {
        queries::counters::count(self.db()?, key, window).await
    }

    async fn reset(&self, key: &str) -> Result<(), RelayError> {
        queries::counters::reset(self.db()?, key).await
    }

    async fn purge_expired(&self, older_than: Duration) -> Result<u64, RelayError> {
        queries::counters::purge_expired(self.db()?, older_than).await
    }
}
