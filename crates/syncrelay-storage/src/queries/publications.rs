// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publication queue operations.
//!
//! Claims are single conditional UPDATE statements, so concurrent workers
//! never hold the same job in `publishing`. Each claim is stamped with
//! `claimed_at` so that abandoned claims can be released.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use syncrelay_core::{Metadata, NewPublication, PublicationJob, PublicationStatus, RelayError};

use crate::codec::{self, get_enum, get_json, get_opt_ts, get_ts};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, preset_id, media_id, title, description, scheduled_at, status, \
                       result, error_message, created_at, published_at";

/// Effective due time ordering: unscheduled jobs count as due at creation.
const DUE_ORDER: &str = "COALESCE(scheduled_at, created_at), created_at, id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<PublicationJob> {
    Ok(PublicationJob {
        id: row.get(0)?,
        preset_id: row.get(1)?,
        media_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        scheduled_at: get_opt_ts(row, 5)?,
        status: get_enum(row, 6)?,
        result: get_json(row, 7)?,
        error_message: row.get(8)?,
        created_at: get_ts(row, 9)?,
        published_at: get_opt_ts(row, 10)?,
    })
}

fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<PublicationJob>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM publication_jobs WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Insert a job in the given initial status.
pub async fn insert_publication(
    db: &Database,
    publication: &NewPublication,
    status: PublicationStatus,
) -> Result<PublicationJob, RelayError> {
    let publication = publication.clone();
    let scheduled_at = publication.scheduled_at.as_ref().map(codec::ts);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<PublicationJob, RelayError>> {
            conn.execute(
                "INSERT INTO publication_jobs (preset_id, media_id, title, description,
                     scheduled_at, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    publication.preset_id,
                    publication.media_id,
                    publication.title,
                    publication.description,
                    scheduled_at,
                    status.to_string(),
                    codec::now(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(load(conn, id)?
                .ok_or_else(|| RelayError::Internal(format!("publication {id} vanished"))))
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn get_publication(db: &Database, id: i64) -> Result<Option<PublicationJob>, RelayError> {
    db.connection()
        .call(move |conn| load(conn, id))
        .await
        .map_err(map_tr_err)
}

/// Newest first, optionally filtered by status.
pub async fn list_publications(
    db: &Database,
    status: Option<PublicationStatus>,
    limit: usize,
) -> Result<Vec<PublicationJob>, RelayError> {
    let status = status.map(|s| s.to_string());
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM publication_jobs
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

/// Delete a job that no worker holds in Publishing.
pub async fn delete_publication(db: &Database, id: i64) -> Result<(), RelayError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<(), RelayError>> {
            let deleted = conn.execute(
                "DELETE FROM publication_jobs WHERE id = ?1 AND status <> 'publishing'",
                params![id],
            )?;
            if deleted == 1 {
                return Ok(Ok(()));
            }
            let status: Option<PublicationStatus> = conn
                .query_row(
                    "SELECT status FROM publication_jobs WHERE id = ?1",
                    params![id],
                    |row| get_enum(row, 0),
                )
                .optional()?;
            Ok(Err(match status {
                Some(status) => RelayError::InvalidState {
                    entity: "publication",
                    id,
                    from: status.to_string(),
                    to: "deleted".to_string(),
                },
                None => RelayError::not_found("publication", id),
            }))
        })
        .await
        .map_err(map_tr_err)?
}

/// Conditional `from -> to` move. Re-queueing clears the previous outcome.
pub async fn transition_publication(
    db: &Database,
    id: i64,
    from: PublicationStatus,
    to: PublicationStatus,
) -> Result<bool, RelayError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE publication_jobs SET status = ?1,
                     error_message = CASE WHEN ?1 = 'queued' THEN NULL ELSE error_message END,
                     published_at = CASE WHEN ?1 = 'queued' THEN NULL ELSE published_at END
                 WHERE id = ?2 AND status = ?3",
                params![to.to_string(), id, from.to_string()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Move every Draft whose schedule has elapsed to Queued.
pub async fn promote_due_drafts(db: &Database, now: DateTime<Utc>) -> Result<u64, RelayError> {
    let now = codec::ts(&now);
    let promoted = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE publication_jobs SET status = 'queued'
                 WHERE status = 'draft' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1",
                params![now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(promoted as u64)
}

/// Claim the earliest due Queued job.
///
/// `now` selects which jobs are due; the claim itself is stamped with the
/// wall clock so the lease runs from the moment the job was taken.
pub async fn claim_next_publication(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Option<PublicationJob>, RelayError> {
    let now = codec::ts(&now);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE publication_jobs SET status = 'publishing', claimed_at = ?2
                     WHERE status = 'queued' AND id = (
                         SELECT id FROM publication_jobs
                         WHERE status = 'queued'
                           AND (scheduled_at IS NULL OR scheduled_at <= ?1)
                         ORDER BY {DUE_ORDER}
                         LIMIT 1)
                     RETURNING {COLUMNS}"
                ),
                params![now, codec::now()],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Publishing -> Published with the adapter's result payload.
pub async fn complete_publication(
    db: &Database,
    id: i64,
    result: &Metadata,
    published_at: DateTime<Utc>,
) -> Result<bool, RelayError> {
    let result = codec::json(result)?;
    let published_at = codec::ts(&published_at);
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE publication_jobs SET status = 'published', result = ?1,
                     published_at = ?2, error_message = NULL, claimed_at = NULL
                 WHERE id = ?3 AND status = 'publishing'",
                params![result, published_at, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Publishing -> Failed with the error text.
pub async fn fail_publication(db: &Database, id: i64, error: &str) -> Result<bool, RelayError> {
    let error = error.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE publication_jobs SET status = 'failed', error_message = ?1,
                     claimed_at = NULL
                 WHERE id = ?2 AND status = 'publishing'",
                params![error, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Fail every Publishing job claimed before `claimed_before`.
///
/// Jobs claimed before claims were stamped have no `claimed_at` and count
/// as expired.
pub async fn release_expired_claims(
    db: &Database,
    claimed_before: DateTime<Utc>,
    reason: &str,
) -> Result<u64, RelayError> {
    let claimed_before = codec::ts(&claimed_before);
    let reason = reason.to_string();
    let released = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE publication_jobs SET status = 'failed', error_message = ?1,
                     claimed_at = NULL
                 WHERE status = 'publishing'
                   AND (claimed_at IS NULL OR claimed_at < ?2)",
                params![reason, claimed_before],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(released as u64)
}

/// Number of jobs in each status that has at least one job.
pub async fn count_publications(
    db: &Database,
) -> Result<Vec<(PublicationStatus, u64)>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM publication_jobs GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map([], |row| {
                let status: PublicationStatus = get_enum(row, 0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as u64))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
