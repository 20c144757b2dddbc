// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Last liveness report per platform adapter.

use rusqlite::params;
use syncrelay_core::{AdapterReport, RelayError};

use crate::codec::{self, get_enum, get_ts};
use crate::database::{Database, map_tr_err};

/// Store `report` as the latest one for its platform.
pub async fn record_report(db: &Database, report: &AdapterReport) -> Result<(), RelayError> {
    let platform = report.platform.to_string();
    let reported_at = codec::ts(&report.reported_at);
    let error = report.error.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO adapter_health (platform, reported_at, error) VALUES (?1, ?2, ?3)
                 ON CONFLICT(platform) DO UPDATE SET
                     reported_at = excluded.reported_at, error = excluded.error",
                params![platform, reported_at, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_reports(db: &Database) -> Result<Vec<AdapterReport>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, reported_at, error FROM adapter_health ORDER BY platform",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(AdapterReport {
                    platform: get_enum(row, 0)?,
                    reported_at: get_ts(row, 1)?,
                    error: row.get(2)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
