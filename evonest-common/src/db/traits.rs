//! Trait row persistence
//!
//! Row <-> [`TraitRecord`] mapping shared by ingestion and the conversion
//! service. `recent_change_date` is stored as RFC 3339 text and `date` as the
//! text it was recorded with; `logbook` and `extra` as JSON text.

use crate::db::models::{TraitId, TraitRecord};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

/// Column list matching [`trait_from_row`]
pub const TRAIT_COLUMNS: &str =
    r#"id, "type", measurement, unit, sample_id, date, recent_change_date, logbook, extra"#;

/// Decode one `traits` row
pub fn trait_from_row(row: &SqliteRow) -> Result<TraitRecord> {
    let id: String = row.try_get("id")?;
    let logbook: String = row.try_get("logbook")?;
    let extra: String = row.try_get("extra")?;

    Ok(TraitRecord {
        trait_type: row.try_get("type")?,
        measurement: row.try_get("measurement")?,
        unit: row.try_get("unit")?,
        sample_id: row.try_get("sample_id")?,
        date: row.try_get("date")?,
        recent_change_date: parse_timestamp(
            &id,
            "recent_change_date",
            row.try_get("recent_change_date")?,
        ),
        logbook: serde_json::from_str(&logbook)?,
        extra: serde_json::from_str(&extra)?,
        id: TraitId(id),
    })
}

fn parse_timestamp(id: &str, column: &str, value: Option<String>) -> Option<DateTime<Utc>> {
    let raw = value?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(trait_id = %id, column, value = %raw, "Ignoring unparseable timestamp: {}", e);
            None
        }
    }
}

/// Insert or replace a trait
pub async fn save_trait(pool: &SqlitePool, record: &TraitRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO traits (id, "type", measurement, unit, sample_id, date, recent_change_date, logbook, extra)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            "type" = excluded."type",
            measurement = excluded.measurement,
            unit = excluded.unit,
            sample_id = excluded.sample_id,
            date = excluded.date,
            recent_change_date = excluded.recent_change_date,
            logbook = excluded.logbook,
            extra = excluded.extra
        "#,
    )
    .bind(record.id.as_str())
    .bind(&record.trait_type)
    .bind(record.measurement)
    .bind(&record.unit)
    .bind(&record.sample_id)
    .bind(&record.date)
    .bind(
        record
            .recent_change_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true)),
    )
    .bind(serde_json::to_string(&record.logbook)?)
    .bind(serde_json::to_string(&record.extra)?)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a trait by id
pub async fn load_trait(pool: &SqlitePool, id: &TraitId) -> Result<Option<TraitRecord>> {
    let sql = format!("SELECT {} FROM traits WHERE id = ?", TRAIT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(trait_from_row).transpose()
}

/// Count total traits in database
pub async fn count_traits(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM traits")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
