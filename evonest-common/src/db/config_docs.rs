//! Configuration documents (`config` table)
//!
//! Each row holds one JSON array, keyed by configuration type. Writers bump
//! `version` so readers can tell a stale snapshot from a fresh one.

use crate::db::models::{BaseUnit, TraitTypeConfig, BASE_UNITS_CONFIG, TRAIT_TYPES_CONFIG};
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;

/// Load and decode a configuration document; `None` when the row is absent
pub async fn load_config<T>(pool: &SqlitePool, config_type: &str) -> Result<Option<Vec<T>>>
where
    T: DeserializeOwned,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT data FROM config WHERE config_type = ?")
        .bind(config_type)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((data,)) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Store a configuration document, replacing any previous version
pub async fn save_config<T>(pool: &SqlitePool, config_type: &str, entries: &[T]) -> Result<()>
where
    T: Serialize,
{
    let data = serde_json::to_string(entries)?;

    sqlx::query(
        r#"
        INSERT INTO config (config_type, data, version, last_modified)
        VALUES (?, ?, 1, CURRENT_TIMESTAMP)
        ON CONFLICT(config_type) DO UPDATE SET
            data = excluded.data,
            version = config.version + 1,
            last_modified = CURRENT_TIMESTAMP
        "#,
    )
    .bind(config_type)
    .bind(data)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_trait_types(pool: &SqlitePool) -> Result<Option<Vec<TraitTypeConfig>>> {
    load_config(pool, TRAIT_TYPES_CONFIG).await
}

pub async fn save_trait_types(pool: &SqlitePool, entries: &[TraitTypeConfig]) -> Result<()> {
    save_config(pool, TRAIT_TYPES_CONFIG, entries).await
}

pub async fn load_base_units(pool: &SqlitePool) -> Result<Option<Vec<BaseUnit>>> {
    load_config(pool, BASE_UNITS_CONFIG).await
}

pub async fn save_base_units(pool: &SqlitePool, entries: &[BaseUnit]) -> Result<()> {
    save_config(pool, BASE_UNITS_CONFIG, entries).await
}
