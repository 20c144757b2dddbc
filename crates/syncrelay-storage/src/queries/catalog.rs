// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preset and media asset catalog.

use rusqlite::{Connection, OptionalExtension, Row, params};
use syncrelay_core::{MediaAsset, NewMediaAsset, NewPreset, Preset, RelayError};

use crate::codec::{self, get_enum, get_json, get_ts};
use crate::database::{Database, map_tr_err};

const PRESET_COLUMNS: &str = "id, name, platform, config, is_active, created_at, updated_at";
const MEDIA_COLUMNS: &str =
    "id, filename, original_filename, file_path, file_type, file_size, mime_type, created_at";

fn preset_from_row(row: &Row<'_>) -> rusqlite::Result<Preset> {
    Ok(Preset {
        id: row.get(0)?,
        name: row.get(1)?,
        platform: get_enum(row, 2)?,
        config: get_json(row, 3)?,
        is_active: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaAsset> {
    Ok(MediaAsset {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_filename: row.get(2)?,
        file_path: row.get(3)?,
        file_type: row.get(4)?,
        file_size: row.get(5)?,
        mime_type: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn load_preset(conn: &Connection, id: i64) -> rusqlite::Result<Option<Preset>> {
    conn.query_row(
        &format!("SELECT {PRESET_COLUMNS} FROM presets WHERE id = ?1"),
        params![id],
        preset_from_row,
    )
    .optional()
}

fn duplicate_name(name: &str) -> RelayError {
    RelayError::Conflict(format!("preset name `{name}` is already taken"))
}

/// Insert a preset. Names are unique.
pub async fn insert_preset(db: &Database, preset: &NewPreset) -> Result<Preset, RelayError> {
    let preset = preset.clone();
    let config = codec::json(&preset.config)?;
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<Preset, RelayError>> {
            let now = codec::now();
            let inserted = conn.execute(
                "INSERT INTO presets (name, platform, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![preset.name, preset.platform.to_string(), config, now],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if codec::is_constraint_violation(&e) => {
                    return Ok(Err(duplicate_name(&preset.name)));
                }
                Err(e) => return Err(e),
            }
            let id = conn.last_insert_rowid();
            Ok(load_preset(conn, id)?
                .ok_or_else(|| RelayError::Internal(format!("preset {id} vanished"))))
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn update_preset(
    db: &Database,
    id: i64,
    preset: &NewPreset,
) -> Result<Preset, RelayError> {
    let preset = preset.clone();
    let config = codec::json(&preset.config)?;
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<Preset, RelayError>> {
            let updated = conn.execute(
                "UPDATE presets SET name = ?1, platform = ?2, config = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    preset.name,
                    preset.platform.to_string(),
                    config,
                    codec::now(),
                    id
                ],
            );
            match updated {
                Ok(0) => return Ok(Err(RelayError::not_found("preset", id))),
                Ok(_) => {}
                Err(e) if codec::is_constraint_violation(&e) => {
                    return Ok(Err(duplicate_name(&preset.name)));
                }
                Err(e) => return Err(e),
            }
            Ok(load_preset(conn, id)?.ok_or_else(|| RelayError::not_found("preset", id)))
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn get_preset(db: &Database, id: i64) -> Result<Option<Preset>, RelayError> {
    db.connection()
        .call(move |conn| load_preset(conn, id))
        .await
        .map_err(map_tr_err)
}

/// All presets ordered by name.
pub async fn list_presets(db: &Database) -> Result<Vec<Preset>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PRESET_COLUMNS} FROM presets ORDER BY name"))?;
            let rows = stmt.query_map([], preset_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a preset. Jobs referencing it fail at dispatch time.
pub async fn delete_preset(db: &Database, id: i64) -> Result<(), RelayError> {
    let deleted = db
        .connection()
        .call(move |conn| conn.execute("DELETE FROM presets WHERE id = ?1", params![id]))
        .await
        .map_err(map_tr_err)?;
    if deleted == 0 {
        return Err(RelayError::not_found("preset", id));
    }
    Ok(())
}

/// Register metadata of an uploaded file.
pub async fn insert_media(db: &Database, media: &NewMediaAsset) -> Result<MediaAsset, RelayError> {
    let media = media.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<MediaAsset, RelayError>> {
            conn.execute(
                "INSERT INTO media_assets (filename, original_filename, file_path, file_type,
                     file_size, mime_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    media.filename,
                    media.original_filename,
                    media.file_path,
                    media.file_type,
                    media.file_size,
                    media.mime_type,
                    codec::now(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            let stored = conn
                .query_row(
                    &format!("SELECT {MEDIA_COLUMNS} FROM media_assets WHERE id = ?1"),
                    params![id],
                    media_from_row,
                )
                .optional()?;
            Ok(stored.ok_or_else(|| RelayError::Internal(format!("media {id} vanished"))))
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn get_media(db: &Database, id: i64) -> Result<Option<MediaAsset>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media_assets WHERE id = ?1"),
                params![id],
                media_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
