//! Settings table accessors
//!
//! Key/value pairs stored as text; typed access goes through `FromStr`.

use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Pending-update bound for apply batches
pub const MAX_IN_FLIGHT_UPDATES: &str = "uc_max_in_flight_updates";

/// Keyset page size for trait scans
pub const SCAN_PAGE_SIZE: &str = "uc_scan_page_size";

/// Default wall-clock budget in ms for one batch (0 = unbounded)
pub const BATCH_TIME_BUDGET_MS: &str = "uc_batch_time_budget_ms";

/// Read and parse a setting; `None` when the key is absent or NULL
pub async fn get_setting<T>(pool: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Insert or overwrite a setting
pub async fn set_setting<T>(pool: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the setting with `default_value` if missing, or reset it if NULL
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let current: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match current {
        None => {
            // INSERT OR IGNORE: two services may initialize the same database
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some((None,)) => {
            set_setting(pool, key, default_value).await?;
            info!("Reset NULL setting '{}' to default value: {}", key, default_value);
        }
        Some((Some(_),)) => {}
    }

    Ok(())
}
