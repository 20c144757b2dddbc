// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./syncrelay.toml` > `~/.config/syncrelay/syncrelay.toml`
//! > `/etc/syncrelay/syncrelay.toml` with environment variable overrides via
//! the `SYNCRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SyncRelayConfig;

/// Top-level sections, longest first so `rate_limit_` wins over shorter prefixes.
const SECTIONS: &[&str] = &[
    "rate_limit",
    "scheduler",
    "adapters",
    "service",
    "storage",
    "health",
    "sync",
];

/// Nested tables inside `[rate_limit]`.
const RATE_LIMIT_TABLES: &[&str] = &["inbound_sync", "login"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/syncrelay/syncrelay.toml` (system-wide)
/// 3. `~/.config/syncrelay/syncrelay.toml` (user XDG config)
/// 4. `./syncrelay.toml` (local directory)
/// 5. `SYNCRELAY_*` environment variables
pub fn load_config() -> Result<SyncRelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SyncRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyncRelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SyncRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyncRelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SyncRelayConfig::default()))
        .merge(Toml::file("/etc/syncrelay/syncrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("syncrelay/syncrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("syncrelay.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SYNCRELAY_STORAGE_DATABASE_PATH` must map to
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("SYNCRELAY_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to a dotted figment path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        else {
            continue;
        };
        if *section == "rate_limit" {
            for table in RATE_LIMIT_TABLES {
                if let Some(field) = rest.strip_prefix(table).and_then(|r| r.strip_prefix('_')) {
                    return format!("rate_limit.{table}.{field}");
                }
            }
        }
        return format!("{section}.{rest}");
    }
    key.to_string()
}
