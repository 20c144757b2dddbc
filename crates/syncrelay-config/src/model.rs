// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for syncrelay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level syncrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncRelayConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cross-platform sync settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Publication scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Rate/abuse guard limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Adapter liveness settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Platform adapter endpoints used by the HTTP dispatcher.
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "syncrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("syncrelay").join("syncrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("syncrelay.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Cross-platform sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Dispatch attempts per content revision before a record stays Failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for the retry backoff.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Timeout applied to every relay/edit call.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// How long a relayed message is recognized as an echo of our own post.
    #[serde(default = "default_loop_window_secs")]
    pub loop_window_secs: u64,

    /// Maximum age of the cached pairing snapshot.
    #[serde(default = "default_registry_ttl_secs")]
    pub registry_ttl_secs: u64,

    /// How often `serve` sweeps Failed records for retry.
    #[serde(default = "default_retry_sweep_interval_secs")]
    pub retry_sweep_interval_secs: u64,

    /// Maximum records retried per sweep.
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            loop_window_secs: default_loop_window_secs(),
            registry_ttl_secs: default_registry_ttl_secs(),
            retry_sweep_interval_secs: default_retry_sweep_interval_secs(),
            retry_batch_size: default_retry_batch_size(),
        }
    }
}

impl SyncConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn loop_window(&self) -> Duration {
        Duration::from_secs(self.loop_window_secs)
    }

    pub fn registry_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_ttl_secs)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    2_000
}

fn default_retry_max_delay_ms() -> u64 {
    300_000
}

fn default_dispatch_timeout_secs() -> u64 {
    15
}

fn default_loop_window_secs() -> u64 {
    86_400
}

fn default_registry_ttl_secs() -> u64 {
    30
}

fn default_retry_sweep_interval_secs() -> u64 {
    10
}

fn default_retry_batch_size() -> usize {
    50
}

/// Publication scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Run the scheduler inside `serve`.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Seconds between queue scans.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Concurrent publishing workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Timeout applied to every publish call.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// Promote Draft jobs to Queued once their schedule elapses.
    #[serde(default = "default_promote_due_drafts")]
    pub promote_due_drafts: bool,

    /// A job left in Publishing longer than this is failed so an operator
    /// can requeue it. Must exceed `publish_timeout_secs`.
    #[serde(default = "default_publish_lease_secs")]
    pub publish_lease_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            tick_interval_secs: default_tick_interval_secs(),
            workers: default_workers(),
            publish_timeout_secs: default_publish_timeout_secs(),
            promote_due_drafts: default_promote_due_drafts(),
            publish_lease_secs: default_publish_lease_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn publish_lease(&self) -> Duration {
        Duration::from_secs(self.publish_lease_secs)
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_tick_interval_secs() -> u64 {
    5
}

fn default_workers() -> usize {
    2
}

fn default_publish_timeout_secs() -> u64 {
    30
}

fn default_promote_due_drafts() -> bool {
    true
}

fn default_publish_lease_secs() -> u64 {
    300
}

/// Where rate counters live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Per-process counters.
    Memory,
    /// Counters in the shared SQLite database, visible to every instance.
    #[default]
    Sqlite,
}

/// A fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowLimit {
    /// Events admitted per window.
    pub max_events: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl WindowLimit {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate/abuse guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Counter backend.
    #[serde(default)]
    pub backend: CounterBackend,

    /// Failed login attempts per client address.
    #[serde(default = "default_login_limit")]
    pub login: WindowLimit,

    /// Inbound sync events per source channel.
    #[serde(default = "default_inbound_sync_limit")]
    pub inbound_sync: WindowLimit,
}

impl RateLimitConfig {
    /// The longest configured window. Counters older than this are dead.
    pub fn longest_window(&self) -> Duration {
        self.login.window().max(self.inbound_sync.window())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            login: default_login_limit(),
            inbound_sync: default_inbound_sync_limit(),
        }
    }
}

fn default_login_limit() -> WindowLimit {
    WindowLimit {
        max_events: 5,
        window_secs: 300,
    }
}

fn default_inbound_sync_limit() -> WindowLimit {
    WindowLimit {
        max_events: 20,
        window_secs: 60,
    }
}

/// Adapter liveness configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// An adapter silent for longer than this is reported offline.
    #[serde(default = "default_offline_after_secs")]
    pub offline_after_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            offline_after_secs: default_offline_after_secs(),
        }
    }
}

fn default_offline_after_secs() -> u64 {
    300
}

/// Endpoint of one platform adapter sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterEndpoint {
    /// Base URL, e.g. `http://telegram-bot:8080`.
    pub url: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
}

/// Platform adapter endpoints, keyed by platform name.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub endpoints: BTreeMap<String, AdapterEndpoint>,
}
