// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `syncrelay status` command implementation.
//!
//! Reads adapter health and queue counters straight from the database, so it
//! works whether or not `serve` is running.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use syncrelay_config::model::SyncRelayConfig;
use syncrelay_core::{
    AdapterState, AdapterStatus, PublicationStatus, RelayError, StorageAdapter, SyncLedger,
    SyncStatus,
};
use syncrelay_publish::PublicationQueue;
use syncrelay_storage::SqliteStorage;
use syncrelay_sync::HealthMonitor;

/// Sync records examined when counting failures.
const FAILED_SCAN_LIMIT: usize = 1000;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub adapters: Vec<AdapterStatus>,
    pub publications: Vec<(PublicationStatus, u64)>,
    pub failed_syncs: usize,
}

/// Collects the report from an open storage backend.
pub async fn collect_status(
    storage: Arc<SqliteStorage>,
    offline_after: Duration,
) -> Result<StatusReport, RelayError> {
    let health = HealthMonitor::new(storage.clone(), offline_after);
    let queue = PublicationQueue::new(storage.clone(), storage.clone());

    let adapters = health.statuses().await?;
    let publications = queue.counts().await?;
    let failed_syncs = storage
        .list_sync_records(Some(SyncStatus::Failed), FAILED_SCAN_LIMIT)
        .await?
        .len();

    Ok(StatusReport {
        adapters,
        publications,
        failed_syncs,
    })
}

/// Run the `syncrelay status` command.
pub async fn run_status(config: &SyncRelayConfig, json: bool) -> Result<(), RelayError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let report = collect_status(
        storage.clone(),
        Duration::from_secs(config.health.offline_after_secs),
    )
    .await;
    storage.close().await?;
    let report = report?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| RelayError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

fn render(report: &StatusReport) -> String {
    let mut out = String::from("adapters:\n");
    for status in &report.adapters {
        let detail = match (&status.state, &status.last_error) {
            (AdapterState::Error, Some(err)) => format!(" ({err})"),
            _ => String::new(),
        };
        let seen = status
            .last_report_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "  {:<10} {:<8} last report {seen}{detail}\n",
            status.platform.to_string(),
            status.state.to_string(),
        ));
    }

    out.push_str("publications:\n");
    if report.publications.is_empty() {
        out.push_str("  (none)\n");
    }
    for (status, count) in &report.publications {
        out.push_str(&format!("  {:<10} {count}\n", status.to_string()));
    }
    out.push_str(&format!("failed syncs: {}\n", report.failed_syncs));
    out
}

#[cfg(test)]
mod tests {
    use syncrelay_core::{HealthStore, Platform};
    use syncrelay_test_utils::TestHarness;

    use super::*;

    #[tokio::test]
    async fn status_reports_all_platforms_offline_on_fresh_database() {
        let harness = TestHarness::builder().build().await.unwrap();
        let report = collect_status(harness.storage.clone(), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(report.adapters.len(), Platform::ALL.len());
        assert!(
            report
                .adapters
                .iter()
                .all(|a| a.state == AdapterState::Offline)
        );
        assert!(report.publications.is_empty());
        assert_eq!(report.failed_syncs, 0);
    }

    #[tokio::test]
    async fn status_reflects_adapter_reports() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.health.report(Platform::Discord, None).await.unwrap();
        harness
            .health
            .report(Platform::Telegram, Some("token revoked".into()))
            .await
            .unwrap();
        assert_eq!(harness.storage.list_reports().await.unwrap().len(), 2);

        let report = collect_status(harness.storage.clone(), Duration::from_secs(300))
            .await
            .unwrap();
        let state_of = |p: Platform| {
            report
                .adapters
                .iter()
                .find(|a| a.platform == p)
                .map(|a| a.state)
        };
        assert_eq!(state_of(Platform::Discord), Some(AdapterState::Online));
        assert_eq!(state_of(Platform::Telegram), Some(AdapterState::Error));

        let text = render(&report);
        assert!(text.contains("token revoked"), "got: {text}");
        assert!(text.contains("failed syncs: 0"));
    }
}
