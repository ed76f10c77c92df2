use super::{check_types, BatchLimits};
use crate::analyzer::{analyze, ConversionVerdict, SkipReason};
use crate::error::ConversionError;
use crate::registry::RegistrySnapshot;
use crate::store::{TraitQuery, TraitStore};
use evonest_common::db::{TraitId, TraitRecord};
use futures::{future, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{info, trace};

/// Most conversions reported in a preview
pub const PREVIEW_LIMIT: usize = 10;

/// One proposed conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewEntry {
    pub trait_id: TraitId,
    pub sample_id: Option<String>,
    #[serde(rename = "type")]
    pub trait_type: String,
    pub old_value: Option<f64>,
    pub old_unit: Option<String>,
    pub new_value: f64,
    pub new_unit: String,
    pub date: Option<String>,
}

impl PreviewEntry {
    fn new(record: TraitRecord, new_value: f64, new_unit: String) -> Self {
        Self {
            trait_id: record.id,
            sample_id: record.sample_id,
            trait_type: record.trait_type,
            old_value: record.measurement,
            old_unit: record.unit,
            new_value,
            new_unit,
            date: record.date,
        }
    }
}

/// Preview outcome; `will_convert + will_skip == total_traits`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total_traits: u64,
    pub will_convert: u64,
    pub will_skip: u64,
    /// First conversions in scan order, at most [`PREVIEW_LIMIT`]
    pub preview: Vec<PreviewEntry>,
    pub stopped_early: bool,
}

/// Count what an apply over `query` would do, without writing anything
pub async fn preview<S>(
    store: &S,
    query: &TraitQuery,
    registry: &RegistrySnapshot,
    limits: &BatchLimits,
) -> Result<BatchResult, ConversionError>
where
    S: TraitStore + ?Sized,
{
    check_types(store, query, registry).await?;

    let cutoff = limits.start();
    let mut records = store
        .scan(query)
        .take_while(|_| future::ready(cutoff.admit()));
    let mut result = BatchResult::default();

    while let Some(record) = records.try_next().await? {
        result.total_traits += 1;

        match analyze(&record, registry) {
            ConversionVerdict::Convert {
                new_value,
                new_unit,
                ..
            } => {
                result.will_convert += 1;
                if result.preview.len() < PREVIEW_LIMIT {
                    result
                        .preview
                        .push(PreviewEntry::new(record, new_value, new_unit));
                }
            }
            ConversionVerdict::Skip(SkipReason::UnknownType) => {
                return Err(ConversionError::UnknownTraitType {
                    trait_id: record.id,
                    trait_type: record.trait_type,
                });
            }
            ConversionVerdict::Skip(reason) => {
                trace!(trait_id = %record.id, %reason, "Skipping trait");
                result.will_skip += 1;
            }
        }
    }

    result.stopped_early = cutoff.stopped_early();
    info!(
        total = result.total_traits,
        will_convert = result.will_convert,
        will_skip = result.will_skip,
        stopped_early = result.stopped_early,
        "Unit conversion preview complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteTraitStore;
    use evonest_common::db::init_memory_database;
    use evonest_common::db::traits::{load_trait, save_trait};
    use evonest_common::db::TraitTypeConfig;

    fn registry() -> RegistrySnapshot {
        RegistrySnapshot::build(
            Some(vec![
                TraitTypeConfig::quantitative("diameter", "um"),
                TraitTypeConfig::qualitative("colorMorph"),
            ]),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_preview_counts_and_entries() {
        let pool = init_memory_database().await.unwrap();
        let records = [
            TraitRecord::quantitative("a", "diameter", 2.5, "um"),
            TraitRecord::quantitative("b", "diameter", 2500.0, "nm").with_sample("s-1"),
            TraitRecord::qualitative("c", "colorMorph"),
            TraitRecord::quantitative("d", "diameter", 1.0, "xyz"),
        ];
        for record in &records {
            save_trait(&pool, record).await.unwrap();
        }
        let store = SqliteTraitStore::new(pool);

        let result = preview(&store, &TraitQuery::all(), &registry(), &BatchLimits::default())
            .await
            .unwrap();

        assert_eq!(result.total_traits, 4);
        assert_eq!(result.will_convert, 1);
        assert_eq!(result.will_skip, 3);
        assert!(!result.stopped_early);
        assert_eq!(
            result.preview,
            vec![PreviewEntry {
                trait_id: TraitId::from("b"),
                sample_id: Some("s-1".to_string()),
                trait_type: "diameter".to_string(),
                old_value: Some(2500.0),
                old_unit: Some("nm".to_string()),
                new_value: 2.5,
                new_unit: "um".to_string(),
                date: None,
            }]
        );

        let untouched = load_trait(store.pool(), &TraitId::from("b")).await.unwrap().unwrap();
        assert_eq!(untouched.measurement, Some(2500.0));
        assert_eq!(untouched.unit.as_deref(), Some("nm"));
    }

    #[tokio::test]
    async fn test_date_only_value_reaches_preview() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            r#"INSERT INTO traits (id, "type", measurement, unit, date)
               VALUES ('t1', 'diameter', 2500.0, 'nm', '2024-03-15')"#,
        )
        .execute(&pool)
        .await
        .unwrap();
        let store = SqliteTraitStore::new(pool);

        let result = preview(&store, &TraitQuery::all(), &registry(), &BatchLimits::default())
            .await
            .unwrap();

        assert_eq!(result.preview[0].date.as_deref(), Some("2024-03-15"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["preview"][0]["date"], "2024-03-15");
    }

    #[test]
    fn test_preview_serializes_camel_case() {
        let result = BatchResult {
            total_traits: 1,
            will_convert: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalTraits"], 1);
        assert_eq!(json["willConvert"], 1);
        assert_eq!(json["willSkip"], 0);
        assert_eq!(json["stoppedEarly"], false);
    }
}
