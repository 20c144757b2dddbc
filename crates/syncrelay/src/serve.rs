// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `syncrelay serve` command implementation.
//!
//! Opens storage, wires the sync coordinator and publication scheduler to the
//! HTTP dispatcher, and runs the background loops until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use syncrelay_config::model::{CounterBackend, SyncRelayConfig};
use syncrelay_core::{
    AdapterDispatcher, CounterStore, HealthStatus, PluginAdapter, RelayError, StorageAdapter,
};
use syncrelay_guard::{MemoryCounterStore, RateGuard, run_counter_pruner};
use syncrelay_publish::PublicationScheduler;
use syncrelay_storage::SqliteStorage;
use syncrelay_sync::{ChannelRegistry, SyncCoordinator};
use tracing::{error, info, warn};

use crate::dispatcher::HttpDispatcher;
use crate::shutdown;

/// Runs the engine until SIGINT or SIGTERM.
pub async fn run_serve(config: SyncRelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.service.log_level);

    info!(
        name = %config.service.name,
        database = %config.storage.database_path,
        "starting syncrelay"
    );

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let counters: Arc<dyn CounterStore> = match config.rate_limit.backend {
        CounterBackend::Memory => Arc::new(MemoryCounterStore::new()),
        CounterBackend::Sqlite => storage.clone(),
    };

    let request_timeout = config
        .sync
        .dispatch_timeout()
        .max(config.scheduler.publish_timeout());
    let http = HttpDispatcher::new(&config.adapters, request_timeout)?;
    match http.health_check().await? {
        HealthStatus::Healthy => info!(platforms = ?http.platforms(), "adapter endpoints loaded"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            warn!(%reason, "dispatcher is not fully configured")
        }
    }
    let dispatcher: Arc<dyn AdapterDispatcher> = Arc::new(http);

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
        registry,
        storage.clone(),
        dispatcher.clone(),
        inbound_guard,
    ));
    let scheduler = Arc::new(PublicationScheduler::new(
        &config.scheduler,
        storage.clone(),
        storage.clone(),
        dispatcher.clone(),
    ));

    let cancel = shutdown::install_signal_handler();
    let mut tasks = Vec::new();

    let sweep_interval = Duration::from_secs(config.sync.retry_sweep_interval_secs);
    {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.run_retry_sweeper(sweep_interval, cancel).await;
        }));
    }

    {
        let retention = config.rate_limit.longest_window();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(run_counter_pruner(counters, retention, cancel)));
    }

    if config.scheduler.enabled {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            scheduler.run(cancel).await;
        }));
    } else {
        info!("publication scheduler disabled");
    }

    info!("syncrelay running, press Ctrl+C to stop");
    cancel.cancelled().await;

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "background task panicked");
        }
    }

    if let Err(e) = dispatcher.shutdown().await {
        warn!(error = %e, "dispatcher shutdown failed");
    }
    storage.close().await?;
    info!("syncrelay stopped");
    Ok(())
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("syncrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
