//! SQLite-backed trait store
//!
//! Scans use keyset pagination (`id > last_seen ORDER BY id LIMIT n`): each
//! page is fetched completely before any of its records is yielded, so no
//! connection stays checked out while the caller writes.

use super::{ConversionUpdate, TraitQuery, TraitStore, TraitStream, TypeUsage};
use crate::error::ConversionError;
use crate::registry::RegistrySource;
use async_stream::try_stream;
use async_trait::async_trait;
use chrono::SecondsFormat;
use evonest_common::db::config_docs;
use evonest_common::db::traits::{trait_from_row, TRAIT_COLUMNS};
use evonest_common::db::{BaseUnit, TraitId, TraitRecord, TraitTypeConfig};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::trace;

/// Default number of traits fetched per page
pub const DEFAULT_PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct SqliteTraitStore {
    pool: SqlitePool,
    page_size: u32,
}

impl SqliteTraitStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_page(
        &self,
        query: &TraitQuery,
        after: Option<&str>,
    ) -> Result<Vec<TraitRecord>, ConversionError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM traits WHERE 1 = 1", TRAIT_COLUMNS));

        if let Some(after) = after {
            qb.push(" AND id > ").push_bind(after.to_string());
        }
        push_id_filter(&mut qb, query);
        qb.push(" ORDER BY id LIMIT ").push_bind(i64::from(self.page_size));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| {
                trait_from_row(row).map_err(|e| {
                    ConversionError::StoreUnavailable(format!("undecodable trait row: {}", e))
                })
            })
            .collect()
    }
}

fn push_id_filter(qb: &mut QueryBuilder<'_, Sqlite>, query: &TraitQuery) {
    if let Some(ids) = query.ids() {
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str().to_string());
        }
        separated.push_unseparated(")");
    }
}

fn unavailable(err: sqlx::Error) -> ConversionError {
    ConversionError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl TraitStore for SqliteTraitStore {
    fn scan<'a>(&'a self, query: &'a TraitQuery) -> TraitStream<'a> {
        Box::pin(try_stream! {
            let mut last_seen: Option<String> = None;
            loop {
                let page = self.fetch_page(query, last_seen.as_deref()).await?;
                let full_page = page.len() >= self.page_size as usize;
                trace!(rows = page.len(), after = ?last_seen, "Fetched trait page");

                for record in page {
                    last_seen = Some(record.id.as_str().to_string());
                    yield record;
                }

                if !full_page {
                    break;
                }
            }
        })
    }

    async fn distinct_types(&self, query: &TraitQuery) -> Result<Vec<TypeUsage>, ConversionError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(r#"SELECT "type", MIN(id) AS first_id FROM traits WHERE 1 = 1"#);
        push_id_filter(&mut qb, query);
        qb.push(r#" GROUP BY "type" ORDER BY "type""#);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| {
                Ok(TypeUsage {
                    trait_type: row.try_get("type").map_err(unavailable)?,
                    first_id: TraitId(row.try_get("first_id").map_err(unavailable)?),
                })
            })
            .collect()
    }

    async fn apply_conversion(
        &self,
        id: &TraitId,
        update: &ConversionUpdate,
    ) -> Result<bool, ConversionError> {
        let result = sqlx::query(
            r#"
            UPDATE traits SET
                measurement = ?,
                unit = ?,
                recent_change_date = ?,
                logbook = json_insert(COALESCE(logbook, '[]'), '$[#]', ?)
            WHERE id = ?
            "#,
        )
        .bind(update.measurement)
        .bind(&update.unit)
        .bind(update.changed_at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(&update.logbook_entry)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RegistrySource for SqliteTraitStore {
    async fn load_trait_types(&self) -> Result<Option<Vec<TraitTypeConfig>>, ConversionError> {
        Ok(config_docs::load_trait_types(&self.pool).await?)
    }

    async fn load_base_units(&self) -> Result<Option<Vec<BaseUnit>>, ConversionError> {
        Ok(config_docs::load_base_units(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
    use evonest_common::db::init_memory_database;
    use evonest_common::db::traits::{load_trait, save_trait};
    use futures::TryStreamExt;

    async fn seeded_store(count: usize, page_size: u32) -> SqliteTraitStore {
        let pool = init_memory_database().await.unwrap();
        for i in 0..count {
            let record = TraitRecord::quantitative(format!("t-{:03}", i), "mass", i as f64, "mg");
            save_trait(&pool, &record).await.unwrap();
        }
        SqliteTraitStore::new(pool).with_page_size(page_size)
    }

    #[tokio::test]
    async fn test_scan_pages_through_everything_in_id_order() {
        let store = seeded_store(23, 5).await;
        let query = TraitQuery::all();

        let records: Vec<TraitRecord> = store.scan(&query).try_collect().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(records.len(), 23);
        assert_eq!(ids.first(), Some(&"t-000"));
        assert_eq!(ids.last(), Some(&"t-022"));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_scan_exact_page_multiple() {
        let store = seeded_store(10, 5).await;
        let query = TraitQuery::all();
        let records: Vec<TraitRecord> = store.scan(&query).try_collect().await.unwrap();
        assert_eq!(records.len(), 10);
    }

    #[tokio::test]
    async fn test_scan_by_ids_ignores_unknown_and_duplicates() {
        let store = seeded_store(10, 2).await;
        let query = TraitQuery::by_ids(
            ["t-007", "t-001", "missing", "t-001", "t-004"]
                .into_iter()
                .map(TraitId::from),
        );

        let records: Vec<TraitRecord> = store.scan(&query).try_collect().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t-001", "t-004", "t-007"]);
    }

    #[tokio::test]
    async fn test_distinct_types() {
        let store = seeded_store(3, 10).await;
        save_trait(store.pool(), &TraitRecord::qualitative("q-1", "colorMorph"))
            .await
            .unwrap();

        let all = store.distinct_types(&TraitQuery::all()).await.unwrap();
        let types: Vec<&str> = all.iter().map(|u| u.trait_type.as_str()).collect();
        assert_eq!(types, vec!["colorMorph", "mass"]);
        assert_eq!(all[1].first_id, TraitId::from("t-000"));

        let subset = store
            .distinct_types(&TraitQuery::by_ids(vec![TraitId::from("t-002")]))
            .await
            .unwrap();
        assert_eq!(
            subset,
            vec![TypeUsage {
                trait_type: "mass".to_string(),
                first_id: TraitId::from("t-002"),
            }]
        );
    }

    #[tokio::test]
    async fn test_apply_conversion_updates_fields_and_appends_logbook() {
        let store = seeded_store(1, 10).await;
        let id = TraitId::from("t-000");
        let mut record = load_trait(store.pool(), &id).await.unwrap().unwrap();
        record.logbook.push("created".to_string());
        save_trait(store.pool(), &record).await.unwrap();

        let at = Utc
            .with_ymd_and_hms(2024, 5, 17, 9, 30, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let update = ConversionUpdate::new(Some(2500.0), Some("mg"), 2.5, "g", at);
        assert!(store.apply_conversion(&id, &update).await.unwrap());

        let loaded = load_trait(store.pool(), &id).await.unwrap().unwrap();
        assert_eq!(loaded.measurement, Some(2.5));
        assert_eq!(loaded.unit.as_deref(), Some("g"));

        let stored: String = sqlx::query_scalar("SELECT recent_change_date FROM traits WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(stored, "2024-05-17T09:30:00.123Z");
        assert!(update.logbook_entry.starts_with(&stored));
        assert_eq!(loaded.logbook.len(), 2);
        assert_eq!(loaded.logbook[0], "created");
        assert_eq!(loaded.logbook[1], update.logbook_entry);
    }

    #[tokio::test]
    async fn test_apply_conversion_on_missing_trait() {
        let store = seeded_store(0, 10).await;
        let update = ConversionUpdate::new(Some(1.0), Some("mg"), 0.001, "g", Utc::now());
        let applied = store
            .apply_conversion(&TraitId::from("gone"), &update)
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_registry_source_reads_config_documents() {
        let store = seeded_store(0, 10).await;
        assert_eq!(store.load_trait_types().await.unwrap(), None);

        config_docs::save_trait_types(
            store.pool(),
            &[TraitTypeConfig::quantitative("mass", "g")],
        )
        .await
        .unwrap();

        let types = store.load_trait_types().await.unwrap().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(store.load_base_units().await.unwrap(), None);
    }
}
