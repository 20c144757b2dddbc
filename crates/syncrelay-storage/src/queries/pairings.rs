// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel pairing CRUD.
//!
//! A `(platform, channel_id)` endpoint may belong to at most one active
//! pairing, on either side. The check and the write share one transaction on
//! the writer thread.

use rusqlite::{Connection, OptionalExtension, Row, params};
use syncrelay_core::{ChannelPairing, NewPairing, Platform, RelayError};

use crate::codec::{self, get_enum, get_json, get_ts};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, platform, channel_id, channel_name, paired_platform, \
                       paired_channel_id, is_active, config, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ChannelPairing> {
    Ok(ChannelPairing {
        id: row.get(0)?,
        platform: get_enum(row, 1)?,
        channel_id: row.get(2)?,
        channel_name: row.get(3)?,
        paired_platform: get_enum(row, 4)?,
        paired_channel_id: row.get(5)?,
        is_active: row.get(6)?,
        config: get_json(row, 7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<ChannelPairing>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM channel_pairings WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Id of another active pairing touching either endpoint.
fn conflicting(
    conn: &Connection,
    a: (Platform, &str),
    b: (Platform, &str),
    exclude: Option<i64>,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM channel_pairings
         WHERE is_active = 1 AND id <> ?5 AND (
             (platform = ?1 AND channel_id = ?2) OR (paired_platform = ?1 AND paired_channel_id = ?2)
             OR (platform = ?3 AND channel_id = ?4) OR (paired_platform = ?3 AND paired_channel_id = ?4))
         LIMIT 1",
        params![
            a.0.to_string(),
            a.1,
            b.0.to_string(),
            b.1,
            exclude.unwrap_or(0)
        ],
        |row| row.get(0),
    )
    .optional()
}

fn conflict_error(existing: i64, pairing: &NewPairing) -> RelayError {
    RelayError::Conflict(format!(
        "{}/{} or {}/{} is already part of active pairing {existing}",
        pairing.platform, pairing.channel_id, pairing.paired_platform, pairing.paired_channel_id
    ))
}

fn check_endpoints(pairing: &NewPairing) -> Result<(), RelayError> {
    if pairing.platform == pairing.paired_platform
        && pairing.channel_id == pairing.paired_channel_id
    {
        return Err(RelayError::Conflict(format!(
            "{}/{} cannot be paired with itself",
            pairing.platform, pairing.channel_id
        )));
    }
    Ok(())
}

/// Insert a pairing and return the stored row.
pub async fn insert_pairing(
    db: &Database,
    pairing: &NewPairing,
) -> Result<ChannelPairing, RelayError> {
    check_endpoints(pairing)?;
    let pairing = pairing.clone();
    let config = codec::json(&pairing.config)?;
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<ChannelPairing, RelayError>> {
            let tx = conn.transaction()?;
            if pairing.is_active {
                if let Some(existing) = conflicting(
                    &tx,
                    (pairing.platform, &pairing.channel_id),
                    (pairing.paired_platform, &pairing.paired_channel_id),
                    None,
                )? {
                    return Ok(Err(conflict_error(existing, &pairing)));
                }
            }
            let now = codec::now();
            let inserted = tx.execute(
                "INSERT INTO channel_pairings (platform, channel_id, channel_name, paired_platform,
                     paired_channel_id, is_active, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    pairing.platform.to_string(),
                    pairing.channel_id,
                    pairing.channel_name,
                    pairing.paired_platform.to_string(),
                    pairing.paired_channel_id,
                    pairing.is_active,
                    config,
                    now,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if codec::is_constraint_violation(&e) => {
                    return Ok(Err(RelayError::Conflict(e.to_string())));
                }
                Err(e) => return Err(e),
            }
            let id = tx.last_insert_rowid();
            let stored = load(&tx, id)?;
            tx.commit()?;
            Ok(stored.ok_or_else(|| RelayError::Internal(format!("pairing {id} vanished"))))
        })
        .await
        .map_err(map_tr_err)?
}

/// Replace every operator-editable field of a pairing.
pub async fn update_pairing(
    db: &Database,
    id: i64,
    pairing: &NewPairing,
) -> Result<ChannelPairing, RelayError> {
    check_endpoints(pairing)?;
    let pairing = pairing.clone();
    let config = codec::json(&pairing.config)?;
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<ChannelPairing, RelayError>> {
            let tx = conn.transaction()?;
            if load(&tx, id)?.is_none() {
                return Ok(Err(RelayError::not_found("pairing", id)));
            }
            if pairing.is_active {
                if let Some(existing) = conflicting(
                    &tx,
                    (pairing.platform, &pairing.channel_id),
                    (pairing.paired_platform, &pairing.paired_channel_id),
                    Some(id),
                )? {
                    return Ok(Err(conflict_error(existing, &pairing)));
                }
            }
            tx.execute(
                "UPDATE channel_pairings SET platform = ?1, channel_id = ?2, channel_name = ?3,
                     paired_platform = ?4, paired_channel_id = ?5, is_active = ?6, config = ?7,
                     updated_at = ?8
                 WHERE id = ?9",
                params![
                    pairing.platform.to_string(),
                    pairing.channel_id,
                    pairing.channel_name,
                    pairing.paired_platform.to_string(),
                    pairing.paired_channel_id,
                    pairing.is_active,
                    config,
                    codec::now(),
                    id,
                ],
            )?;
            let stored = load(&tx, id)?;
            tx.commit()?;
            Ok(stored.ok_or_else(|| RelayError::not_found("pairing", id)))
        })
        .await
        .map_err(map_tr_err)?
}

/// Activate or deactivate a pairing. Activation re-checks endpoint uniqueness.
pub async fn set_pairing_active(
    db: &Database,
    id: i64,
    active: bool,
) -> Result<ChannelPairing, RelayError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<ChannelPairing, RelayError>> {
            let tx = conn.transaction()?;
            let Some(current) = load(&tx, id)? else {
                return Ok(Err(RelayError::not_found("pairing", id)));
            };
            if active && !current.is_active {
                if let Some(existing) = conflicting(
                    &tx,
                    (current.platform, &current.channel_id),
                    (current.paired_platform, &current.paired_channel_id),
                    Some(id),
                )? {
                    return Ok(Err(RelayError::Conflict(format!(
                        "{}/{} or {}/{} is already part of active pairing {existing}",
                        current.platform,
                        current.channel_id,
                        current.paired_platform,
                        current.paired_channel_id
                    ))));
                }
            }
            tx.execute(
                "UPDATE channel_pairings SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                params![active, codec::now(), id],
            )?;
            let stored = load(&tx, id)?;
            tx.commit()?;
            Ok(stored.ok_or_else(|| RelayError::not_found("pairing", id)))
        })
        .await
        .map_err(map_tr_err)?
}

/// Delete a pairing. Sync records keep their rows with `pairing_id = NULL`.
pub async fn delete_pairing(db: &Database, id: i64) -> Result<(), RelayError> {
    let deleted = db
        .connection()
        .call(move |conn| {
            conn.execute("DELETE FROM channel_pairings WHERE id = ?1", params![id])
        })
        .await
        .map_err(map_tr_err)?;
    if deleted == 0 {
        return Err(RelayError::not_found("pairing", id));
    }
    Ok(())
}

pub async fn get_pairing(db: &Database, id: i64) -> Result<Option<ChannelPairing>, RelayError> {
    db.connection()
        .call(move |conn| load(conn, id))
        .await
        .map_err(map_tr_err)
}

/// All pairings, active or not, in creation order.
pub async fn list_pairings(db: &Database) -> Result<Vec<ChannelPairing>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM channel_pairings ORDER BY id"))?;
            let rows = stmt.query_map([], from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
