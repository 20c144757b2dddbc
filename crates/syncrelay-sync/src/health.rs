// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter liveness derived from the last report of each platform.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use syncrelay_core::{AdapterReport, AdapterState, AdapterStatus, HealthStore, Platform, RelayError};
use tracing::{debug, warn};

pub struct HealthMonitor {
    store: Arc<dyn HealthStore>,
    offline_after: Duration,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn HealthStore>, offline_after: Duration) -> Self {
        Self {
            store,
            offline_after,
        }
    }

    /// Records a heartbeat from `platform`. `error` marks the adapter as failing.
    pub async fn report(&self, platform: Platform, error: Option<String>) -> Result<(), RelayError> {
        match &error {
            Some(error) => warn!(%platform, error = %error, "adapter reported an error"),
            None => debug!(%platform, "adapter heartbeat"),
        }
        self.store
            .record_report(&AdapterReport {
                platform,
                reported_at: Utc::now(),
                error,
            })
            .await
    }

    pub async fn status(&self, platform: Platform) -> Result<AdapterStatus, RelayError> {
        let reports = self.store.list_reports().await?;
        let report = reports.iter().find(|r| r.platform == platform);
        Ok(derive_status(platform, report, Utc::now(), self.offline_after))
    }

    /// Status of every known platform, including those that never reported.
    pub async fn statuses(&self) -> Result<Vec<AdapterStatus>, RelayError> {
        let reports = self.store.list_reports().await?;
        let now = Utc::now();
        Ok(Platform::ALL
            .iter()
            .map(|platform| {
                let report = reports.iter().find(|r| r.platform == *platform);
                derive_status(*platform, report, now, self.offline_after)
            })
            .collect())
    }
}

/// Never reported or silent for longer than `offline_after` is Offline;
/// otherwise an error on the latest report is Error.
pub fn derive_status(
    platform: Platform,
    report: Option<&AdapterReport>,
    now: DateTime<Utc>,
    offline_after: Duration,
) -> AdapterStatus {
    let Some(report) = report else {
        return AdapterStatus {
            platform,
            state: AdapterState::Offline,
            last_report_at: None,
            last_error: None,
        };
    };
    let silent_for = (now - report.reported_at).to_std().unwrap_or_default();
    let state = if silent_for > offline_after {
        AdapterState::Offline
    } else if report.error.is_some() {
        AdapterState::Error
    } else {
        AdapterState::Online
    };
    AdapterStatus {
        platform,
        state,
        last_report_at: Some(report.reported_at),
        last_error: report.error.clone(),
    }
}
