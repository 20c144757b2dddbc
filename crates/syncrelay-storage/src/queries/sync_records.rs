// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync ledger operations.
//!
//! Rows are unique on `(source_platform, source_message_id)`. Status moves
//! are compare-and-swap updates guarded by [`SyncStatus::predecessors`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use syncrelay_core::{Metadata, NewSyncRecord, Platform, RelayError, SyncRecord, SyncStatus};

use crate::codec::{self, get_enum, get_json, get_opt_ts, get_ts};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, pairing_id, source_platform, source_channel_id, source_message_id, \
                       paired_platform, paired_channel_id, paired_message_id, content, metadata, \
                       status, attempts, last_error, next_retry_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<SyncRecord> {
    Ok(SyncRecord {
        id: row.get(0)?,
        pairing_id: row.get(1)?,
        source_platform: get_enum(row, 2)?,
        source_channel_id: row.get(3)?,
        source_message_id: row.get(4)?,
        paired_platform: get_enum(row, 5)?,
        paired_channel_id: row.get(6)?,
        paired_message_id: row.get(7)?,
        content: row.get(8)?,
        metadata: get_json(row, 9)?,
        status: get_enum(row, 10)?,
        attempts: row.get(11)?,
        last_error: row.get(12)?,
        next_retry_at: get_opt_ts(row, 13)?,
        created_at: get_ts(row, 14)?,
        updated_at: get_ts(row, 15)?,
    })
}

fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<SyncRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM sync_records WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// `'a', 'b'` list of the states allowed to move into `status`.
fn predecessor_list(status: SyncStatus) -> String {
    status
        .predecessors()
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn find_by_source(
    db: &Database,
    platform: Platform,
    message_id: &str,
) -> Result<Option<SyncRecord>, RelayError> {
    let platform = platform.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM sync_records
                     WHERE source_platform = ?1 AND source_message_id = ?2"
                ),
                params![platform, message_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The most recently touched record whose relay produced `message_id` on `platform`.
pub async fn find_by_target(
    db: &Database,
    platform: Platform,
    message_id: &str,
) -> Result<Option<SyncRecord>, RelayError> {
    let platform = platform.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM sync_records
                     WHERE paired_platform = ?1 AND paired_message_id = ?2
                     ORDER BY updated_at DESC, id DESC
                     LIMIT 1"
                ),
                params![platform, message_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_sync_record(db: &Database, id: i64) -> Result<Option<SyncRecord>, RelayError> {
    db.connection()
        .call(move |conn| load(conn, id))
        .await
        .map_err(map_tr_err)
}

/// Target stored on an existing row, as read inside the upsert transaction.
struct StoredTarget {
    id: i64,
    status: SyncStatus,
    paired_platform: String,
    paired_channel_id: String,
}

impl StoredTarget {
    /// Whether the record's relayed message lives somewhere other than the new target.
    ///
    /// Rows written before the paired channel was tracked carry an empty
    /// channel and are compared by platform only.
    fn moved(&self, platform: &str, channel_id: &str) -> bool {
        self.paired_platform != platform
            || (!self.paired_channel_id.is_empty() && self.paired_channel_id != channel_id)
    }
}

/// Insert a Pending record or re-open the existing one for the same source.
///
/// Re-opening replaces content and metadata, resets the attempt counter, and
/// clears retry bookkeeping. The paired message id is kept so a later
/// dispatch edits instead of relaying again, unless the pairing now points at
/// a different channel.
///
/// A record in Syncing belongs to the worker that claimed it. Only its
/// content and metadata are replaced and it is returned still in Syncing;
/// the claiming worker picks the new revision up when it finishes.
pub async fn upsert_sync_record(
    db: &Database,
    record: &NewSyncRecord,
) -> Result<(SyncRecord, bool), RelayError> {
    let record = record.clone();
    let metadata = codec::json(&record.metadata)?;
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<(SyncRecord, bool), RelayError>> {
            let tx = conn.transaction()?;
            let source_platform = record.source_platform.to_string();
            let paired_platform = record.paired_platform.to_string();
            let existing = tx
                .query_row(
                    "SELECT id, status, paired_platform, paired_channel_id FROM sync_records
                     WHERE source_platform = ?1 AND source_message_id = ?2",
                    params![source_platform, record.source_message_id],
                    |row| {
                        Ok(StoredTarget {
                            id: row.get(0)?,
                            status: get_enum(row, 1)?,
                            paired_platform: row.get(2)?,
                            paired_channel_id: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            let now = codec::now();
            let (id, created) = match existing {
                Some(stored) if stored.status == SyncStatus::Syncing => {
                    tx.execute(
                        "UPDATE sync_records SET content = ?1, metadata = ?2, updated_at = ?3
                         WHERE id = ?4",
                        params![record.content, metadata, now, stored.id],
                    )?;
                    (stored.id, false)
                }
                Some(stored) => {
                    let moved = stored.moved(&paired_platform, &record.paired_channel_id);
                    tx.execute(
                        "UPDATE sync_records SET pairing_id = ?1, source_channel_id = ?2,
                             paired_platform = ?3, paired_channel_id = ?4,
                             paired_message_id = CASE WHEN ?5 THEN NULL ELSE paired_message_id END,
                             content = ?6, metadata = ?7,
                             status = 'pending', attempts = 0, last_error = NULL,
                             next_retry_at = NULL, updated_at = ?8
                         WHERE id = ?9",
                        params![
                            record.pairing_id,
                            record.source_channel_id,
                            paired_platform,
                            record.paired_channel_id,
                            moved,
                            record.content,
                            metadata,
                            now,
                            stored.id
                        ],
                    )?;
                    (stored.id, false)
                }
                None => {
                    tx.execute(
                        "INSERT INTO sync_records (pairing_id, source_platform, source_channel_id,
                             source_message_id, paired_platform, paired_channel_id, content,
                             metadata, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
                        params![
                            record.pairing_id,
                            source_platform,
                            record.source_channel_id,
                            record.source_message_id,
                            paired_platform,
                            record.paired_channel_id,
                            record.content,
                            metadata,
                            now,
                        ],
                    )?;
                    (tx.last_insert_rowid(), true)
                }
            };
            let stored = load(&tx, id)?;
            tx.commit()?;
            Ok(stored
                .map(|r| (r, created))
                .ok_or_else(|| RelayError::Internal(format!("sync record {id} vanished"))))
        })
        .await
        .map_err(map_tr_err)?
}

/// Compare-and-swap the record into `status`.
///
/// Entering Syncing increments `attempts`. Every move clears `next_retry_at`
/// and replaces `last_error` with `error`. A `None` paired id keeps the
/// stored one. Returns `false` when the record was not in a legal
/// predecessor state (or does not exist).
pub async fn mark_status(
    db: &Database,
    id: i64,
    status: SyncStatus,
    paired_message_id: Option<&str>,
    error: Option<&str>,
) -> Result<bool, RelayError> {
    let paired_message_id = paired_message_id.map(str::to_string);
    let error = error.map(str::to_string);
    let sql = format!(
        "UPDATE sync_records SET status = ?1,
             paired_message_id = COALESCE(?2, paired_message_id),
             last_error = ?3,
             attempts = attempts + (CASE WHEN ?1 = 'syncing' THEN 1 ELSE 0 END),
             next_retry_at = NULL,
             updated_at = ?4
         WHERE id = ?5 AND status IN ({})",
        predecessor_list(status)
    );
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &sql,
                params![
                    status.to_string(),
                    paired_message_id,
                    error,
                    codec::now(),
                    id
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Set when a Failed record becomes eligible for another attempt.
pub async fn schedule_retry(db: &Database, id: i64, at: DateTime<Utc>) -> Result<(), RelayError> {
    let at = codec::ts(&at);
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sync_records SET next_retry_at = ?1 WHERE id = ?2 AND status = 'failed'",
                params![at, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(RelayError::not_found("failed sync record", id));
    }
    Ok(())
}

/// Failed records whose retry time has passed and that have attempts left,
/// oldest retry time first.
pub async fn due_retries(
    db: &Database,
    now: DateTime<Utc>,
    max_attempts: u32,
    limit: usize,
) -> Result<Vec<SyncRecord>, RelayError> {
    let now = codec::ts(&now);
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sync_records
                 WHERE status = 'failed' AND attempts < ?1
                   AND next_retry_at IS NOT NULL AND next_retry_at <= ?2
                 ORDER BY next_retry_at, id
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![max_attempts, now, limit], from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Newest first, optionally filtered by status.
pub async fn list_sync_records(
    db: &Database,
    status: Option<SyncStatus>,
    limit: usize,
) -> Result<Vec<SyncRecord>, RelayError> {
    let status = status.map(|s| s.to_string());
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sync_records
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status, limit], from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_sync_record(db: &Database, id: i64) -> Result<(), RelayError> {
    let deleted = db
        .connection()
        .call(move |conn| conn.execute("DELETE FROM sync_records WHERE id = ?1", params![id]))
        .await
        .map_err(map_tr_err)?;
    if deleted == 0 {
        return Err(RelayError::not_found("sync record", id));
    }
    Ok(())
}
