// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates constraints serde cannot express: non-empty paths, positive
//! limits, bounded timeouts, and recognized platform names.

use std::str::FromStr;

use syncrelay_core::Platform;

use crate::diagnostic::ConfigError;
use crate::model::{SyncRelayConfig, WindowLimit};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted range for dispatcher timeouts, in seconds.
const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=300;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &SyncRelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.sync.max_attempts == 0 {
        errors.push(ConfigError::validation("sync.max_attempts must be at least 1"));
    }

    if config.sync.retry_base_delay_ms > config.sync.retry_max_delay_ms {
        errors.push(ConfigError::validation(format!(
            "sync.retry_base_delay_ms ({}) must not exceed sync.retry_max_delay_ms ({})",
            config.sync.retry_base_delay_ms, config.sync.retry_max_delay_ms
        )));
    }

    check_timeout(
        &mut errors,
        "sync.dispatch_timeout_secs",
        config.sync.dispatch_timeout_secs,
    );
    check_timeout(
        &mut errors,
        "scheduler.publish_timeout_secs",
        config.scheduler.publish_timeout_secs,
    );

    if config.sync.loop_window_secs == 0 {
        errors.push(ConfigError::validation(
            "sync.loop_window_secs must be at least 1",
        ));
    }

    if config.sync.retry_sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "sync.retry_sweep_interval_secs must be at least 1",
        ));
    }

    if config.sync.retry_batch_size == 0 {
        errors.push(ConfigError::validation(
            "sync.retry_batch_size must be at least 1",
        ));
    }

    if config.scheduler.workers == 0 {
        errors.push(ConfigError::validation("scheduler.workers must be at least 1"));
    }

    if config.scheduler.publish_lease_secs <= config.scheduler.publish_timeout_secs {
        errors.push(ConfigError::validation(format!(
            "scheduler.publish_lease_secs ({}) must exceed scheduler.publish_timeout_secs ({})",
            config.scheduler.publish_lease_secs, config.scheduler.publish_timeout_secs
        )));
    }

    if config.scheduler.tick_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "scheduler.tick_interval_secs must be at least 1",
        ));
    }

    check_window(&mut errors, "rate_limit.login", &config.rate_limit.login);
    check_window(
        &mut errors,
        "rate_limit.inbound_sync",
        &config.rate_limit.inbound_sync,
    );

    if config.health.offline_after_secs == 0 {
        errors.push(ConfigError::validation(
            "health.offline_after_secs must be at least 1",
        ));
    }

    for (name, endpoint) in &config.adapters.endpoints {
        if Platform::from_str(name).is_err() {
            errors.push(ConfigError::validation(format!(
                "adapters.endpoints.{name} is not a known platform"
            )));
        }
        if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "adapters.endpoints.{name}.url `{}` must be an http(s) URL",
                endpoint.url
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_timeout(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if !TIMEOUT_RANGE.contains(&value) {
        errors.push(ConfigError::validation(format!(
            "{key} must be between {} and {} seconds, got {value}",
            TIMEOUT_RANGE.start(),
            TIMEOUT_RANGE.end()
        )));
    }
}

fn check_window(errors: &mut Vec<ConfigError>, key: &str, limit: &WindowLimit) {
    if limit.max_events == 0 {
        errors.push(ConfigError::validation(format!(
            "{key}.max_events must be at least 1"
        )));
    }
    if limit.window_secs == 0 {
        errors.push(ConfigError::validation(format!(
            "{key}.window_secs must be at least 1"
        )));
    }
}
