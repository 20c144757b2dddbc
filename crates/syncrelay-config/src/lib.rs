// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for syncrelay.
//!
//! TOML parsing with `deny_unknown_fields`, XDG file lookup, `SYNCRELAY_*`
//! environment overrides, semantic validation, and miette diagnostics that
//! point at the offending key.
//!
//! # Usage
//!
//! ```no_run
//! use syncrelay_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AdapterEndpoint, AdaptersConfig, CounterBackend, HealthConfig, RateLimitConfig,
    SchedulerConfig, ServiceConfig, StorageConfig, SyncConfig, SyncRelayConfig, WindowLimit,
};

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment failures are converted into diagnostics with source spans;
/// validation failures are returned all at once.
pub fn load_and_validate() -> Result<SyncRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<SyncRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SyncRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<SyncRelayConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<SyncRelayConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Read whichever config files exist so diagnostics can quote them.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![
        std::env::current_dir()
            .map(|d| d.join("syncrelay.toml"))
            .unwrap_or_else(|_| "syncrelay.toml".into()),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("syncrelay/syncrelay.toml"));
    }
    candidates.push("/etc/syncrelay/syncrelay.toml".into());

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
