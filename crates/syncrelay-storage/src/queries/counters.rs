// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate counters shared by every process using the database.
//!
//! A window opens on the first increment after the previous one elapsed and
//! lasts `window` from that instant.

use std::time::Duration;

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use syncrelay_core::RelayError;

use crate::database::{Database, map_tr_err};

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Increment `key` and return the count inside the current window.
pub async fn increment(db: &Database, key: &str, window: Duration) -> Result<u64, RelayError> {
    let key = key.to_string();
    let now = Utc::now().timestamp_millis();
    let window = window_ms(window);
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO rate_counters (key, count, window_start) VALUES (?1, 1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                     count = CASE WHEN ?2 - window_start >= ?3 THEN 1 ELSE count + 1 END,
                     window_start = CASE WHEN ?2 - window_start >= ?3 THEN ?2 ELSE window_start END
                 RETURNING count",
                params![key, now, window],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count as u64)
}

/// Count inside the current window, 0 if none is open.
pub async fn count(db: &Database, key: &str, window: Duration) -> Result<u64, RelayError> {
    let key = key.to_string();
    let now = Utc::now().timestamp_millis();
    let window = window_ms(window);
    let count: Option<i64> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT count FROM rate_counters WHERE key = ?1 AND ?2 - window_start < ?3",
                params![key, now, window],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count.unwrap_or(0) as u64)
}

pub async fn reset(db: &Database, key: &str) -> Result<(), RelayError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM rate_counters WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete counters whose window opened at least `older_than` ago.
pub async fn purge_expired(db: &Database, older_than: Duration) -> Result<u64, RelayError> {
    let cutoff = Utc::now().timestamp_millis().saturating_sub(window_ms(older_than));
    let purged = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM rate_counters WHERE window_start <= ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(purged as u64)
}
