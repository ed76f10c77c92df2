//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date.
//! Every step is idempotent, so any service may call it on startup.

use crate::db::settings::{
    ensure_setting, BATCH_TIME_BUDGET_MS, MAX_IN_FLIGHT_UPDATES, SCAN_PAGE_SIZE,
};
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets preview scans read while apply or ingestion writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Uses a single pooled connection that never expires: each SQLite
/// `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_config_table(pool).await?;
    create_traits_table(pool).await?;
    init_default_settings(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the config table
///
/// One JSON array document per configuration type (`traittypes`,
/// `baseunits`, ...).
pub async fn create_config_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config (
            config_type TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the traits table
pub async fn create_traits_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS traits (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            measurement REAL,
            unit TEXT,
            sample_id TEXT,
            date TEXT,
            recent_change_date TEXT,
            logbook TEXT NOT NULL DEFAULT '[]',
            extra TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_traits_type ON traits(type)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, MAX_IN_FLIGHT_UPDATES, "8").await?;
    ensure_setting(pool, SCAN_PAGE_SIZE, "500").await?;
    ensure_setting(pool, BATCH_TIME_BUDGET_MS, "0").await?;
    Ok(())
}
