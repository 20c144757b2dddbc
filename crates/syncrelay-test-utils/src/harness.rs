// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full engine (storage, registry, coordinator,
//! guards, publication queue and scheduler) around a [`MockDispatcher`] and
//! a temp SQLite database that is removed on drop.

use std::sync::Arc;

use syncrelay_config::model::{
    CounterBackend, RateLimitConfig, SchedulerConfig, StorageConfig, SyncConfig, SyncRelayConfig,
    WindowLimit,
};
use syncrelay_core::{
    AdapterDispatcher, CatalogStore, ChannelPairing, CounterStore, EventAction, InboundEvent,
    Metadata, NewPairing, NewPreset, Platform, Preset, RelayError, StorageAdapter,
};
use syncrelay_guard::{LoginGuard, MemoryCounterStore, RateGuard};
use syncrelay_publish::{PublicationQueue, PublicationScheduler};
use syncrelay_storage::SqliteStorage;
use syncrelay_sync::{ChannelRegistry, HealthMonitor, SyncCoordinator};

use crate::mock_dispatcher::MockDispatcher;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SyncRelayConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SyncRelayConfig::default();
        // Tests should not wait on real backoff.
        config.sync.retry_base_delay_ms = 0;
        config.sync.retry_max_delay_ms = 0;
        Self { config }
    }

    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    pub fn with_scheduler_config(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn with_rate_limits(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Override the inbound sync limit only.
    pub fn with_inbound_limit(mut self, max_events: u32, window_secs: u64) -> Self {
        self.config.rate_limit.inbound_sync = WindowLimit {
            max_events,
            window_secs,
        };
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, RelayError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RelayError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let counters: Arc<dyn CounterStore> = match config.rate_limit.backend {
            CounterBackend::Memory => Arc::new(MemoryCounterStore::new()),
            CounterBackend::Sqlite => storage.clone(),
        };

        let dispatcher = Arc::new(MockDispatcher::new());
        let dyn_dispatcher: Arc<dyn AdapterDispatcher> = dispatcher.clone();

        let registry = Arc::new(ChannelRegistry::new(
            storage.clone(),
            config.sync.registry_ttl(),
        ));
        let inbound_guard = RateGuard::new(
            "inbound_sync",
            config.rate_limit.inbound_sync,
            counters.clone(),
        );
        let coordinator = Arc::new(SyncCoordinator::new(
            &config.sync,
            registry.clone(),
            storage.clone(),
            dyn_dispatcher.clone(),
            inbound_guard,
        ));
        let login_guard = LoginGuard::new(config.rate_limit.login, counters);

        let queue = Arc::new(PublicationQueue::new(storage.clone(), storage.clone()));
        let scheduler = Arc::new(PublicationScheduler::new(
            &config.scheduler,
            storage.clone(),
            storage.clone(),
            dyn_dispatcher,
        ));
        let health = Arc::new(HealthMonitor::new(
            storage.clone(),
            std::time::Duration::from_secs(config.health.offline_after_secs),
        ));

        Ok(TestHarness {
            storage,
            dispatcher,
            registry,
            coordinator,
            login_guard,
            queue,
            scheduler,
            health,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock dispatcher and temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The mock dispatcher shared by the coordinator and the scheduler.
    pub dispatcher: Arc<MockDispatcher>,
    pub registry: Arc<ChannelRegistry>,
    pub coordinator: Arc<SyncCoordinator>,
    pub login_guard: LoginGuard,
    pub queue: Arc<PublicationQueue>,
    pub scheduler: Arc<PublicationScheduler>,
    pub health: Arc<HealthMonitor>,
    /// Effective configuration, including the temp database path.
    pub config: SyncRelayConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Register an active pairing between two channels.
    pub async fn pair(
        &self,
        platform: Platform,
        channel_id: &str,
        paired_platform: Platform,
        paired_channel_id: &str,
    ) -> Result<ChannelPairing, RelayError> {
        self.registry
            .upsert_pairing(
                None,
                &NewPairing {
                    platform,
                    channel_id: channel_id.to_string(),
                    channel_name: None,
                    paired_platform,
                    paired_channel_id: paired_channel_id.to_string(),
                    is_active: true,
                    config: Metadata::new(),
                },
            )
            .await
    }

    /// Create a preset on `platform` with an empty config.
    pub async fn preset(&self, name: &str, platform: Platform) -> Result<Preset, RelayError> {
        self.storage
            .insert_preset(&NewPreset {
                name: name.to_string(),
                platform,
                config: Metadata::new(),
            })
            .await
    }

    /// Close the database, checkpointing the WAL.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        self.storage.close().await
    }
}

/// A new-message event.
pub fn create_event(
    platform: Platform,
    channel_id: &str,
    message_id: &str,
    content: &str,
) -> InboundEvent {
    InboundEvent {
        platform,
        channel_id: channel_id.to_string(),
        native_message_id: message_id.to_string(),
        content: content.to_string(),
        metadata: Metadata::new(),
        action: EventAction::Create,
    }
}

/// An edit of a previously announced message.
pub fn edit_event(
    platform: Platform,
    channel_id: &str,
    message_id: &str,
    content: &str,
) -> InboundEvent {
    InboundEvent {
        action: EventAction::Edit,
        ..create_event(platform, channel_id, message_id, content)
    }
}

#[cfg(test)]
mod tests {
    use syncrelay_core::PairingStore;

    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.storage.list_pairings().await.unwrap().is_empty());
        assert!(harness.queue.counts().await.unwrap().is_empty());
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn pair_helper_registers_active_pairing() {
        let harness = TestHarness::builder().build().await.unwrap();
        let pairing = harness
            .pair(Platform::Telegram, "123", Platform::Discord, "456")
            .await
            .unwrap();
        assert!(pairing.is_active);
        let found = harness
            .registry
            .find_pairing(Platform::Discord, "456")
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(pairing.id));
    }

    #[test]
    fn edit_event_keeps_identity() {
        let event = edit_event(Platform::Telegram, "123", "t1", "fixed typo");
        assert_eq!(event.action, EventAction::Edit);
        assert_eq!(event.native_message_id, "t1");
    }
}
