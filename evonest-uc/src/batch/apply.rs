use super::{check_types, BatchLimits};
use crate::analyzer::{analyze, ConversionVerdict, SkipReason};
use crate::error::ConversionError;
use crate::registry::RegistrySnapshot;
use crate::store::{ConversionUpdate, TraitQuery, TraitStore};
use chrono::Utc;
use evonest_common::db::{TraitId, TraitRecord};
use futures::{future, StreamExt};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// A conversion that could not be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub trait_id: TraitId,
    pub reason: String,
}

/// Apply outcome; `converted + skipped + failures.len() == total_traits`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub total_traits: u64,
    pub converted: u64,
    pub skipped: u64,
    pub failures: Vec<ApplyFailure>,
    pub stopped_early: bool,
}

enum Step {
    Skip,
    Convert(TraitId, ConversionUpdate),
}

enum Outcome {
    Skipped,
    Converted,
    Failed(ApplyFailure),
}

fn classify(record: TraitRecord, registry: &RegistrySnapshot) -> Result<Step, ConversionError> {
    match analyze(&record, registry) {
        ConversionVerdict::Convert {
            new_value,
            new_unit,
            delta_power,
        } => {
            trace!(trait_id = %record.id, delta_power, "Converting trait");
            let update = ConversionUpdate::new(
                record.measurement,
                record.unit.as_deref(),
                new_value,
                new_unit,
                Utc::now(),
            );
            Ok(Step::Convert(record.id, update))
        }
        ConversionVerdict::Skip(SkipReason::UnknownType) => Err(ConversionError::UnknownTraitType {
            trait_id: record.id,
            trait_type: record.trait_type,
        }),
        ConversionVerdict::Skip(reason) => {
            trace!(trait_id = %record.id, %reason, "Skipping trait");
            Ok(Step::Skip)
        }
    }
}

/// Persist every conversion the analyzer accepts for `query`
///
/// Updates are pipelined up to `limits.max_in_flight_updates` and tallied in
/// scan order. A failed update is recorded and the batch continues. A fatal
/// error stops the scan, waits for updates already in flight, then returns.
/// There is no compare-and-swap against the scanned values: a trait edited
/// between scan and write is converted from the scanned values.
pub async fn apply<S>(
    store: &S,
    query: &TraitQuery,
    registry: &RegistrySnapshot,
    limits: &BatchLimits,
) -> Result<ApplyResult, ConversionError>
where
    S: TraitStore + ?Sized,
{
    check_types(store, query, registry).await?;

    let cutoff = limits.start();
    let mut outcomes = store
        .scan(query)
        .take_while(|_| future::ready(cutoff.admit()))
        .map(|scanned| {
            let step = scanned.and_then(|record| classify(record, registry));
            async move {
                let (trait_id, update) = match step {
                    Ok(Step::Skip) => return Ok(Outcome::Skipped),
                    Ok(Step::Convert(trait_id, update)) => (trait_id, update),
                    Err(e) => return Err(e),
                };

                let reason = match store.apply_conversion(&trait_id, &update).await {
                    Ok(true) => return Ok(Outcome::Converted),
                    Ok(false) => "trait no longer exists".to_string(),
                    Err(e) => e.to_string(),
                };
                warn!(trait_id = %trait_id, %reason, "Failed to persist unit conversion");
                Ok(Outcome::Failed(ApplyFailure { trait_id, reason }))
            }
        })
        .buffered(limits.max_in_flight_updates.max(1));

    let mut result = ApplyResult::default();
    let mut fatal: Option<ConversionError> = None;

    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Ok(outcome) => {
                result.total_traits += 1;
                match outcome {
                    Outcome::Skipped => result.skipped += 1,
                    Outcome::Converted => result.converted += 1,
                    Outcome::Failed(failure) => result.failures.push(failure),
                }
            }
            Err(e) => {
                if fatal.is_none() {
                    debug!(error = %e, "Aborting batch, draining in-flight updates");
                    cutoff.abort();
                    fatal = Some(e);
                }
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }

    result.stopped_early = cutoff.stopped_early();
    info!(
        total = result.total_traits,
        converted = result.converted,
        skipped = result.skipped,
        failed = result.failures.len(),
        stopped_early = result.stopped_early,
        "Unit conversion applied"
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
                TraitTypeConfig::quantitative("mass", "g"),
                TraitTypeConfig::qualitative("colorMorph"),
            ]),
            None,
        )
        .unwrap()
    }

    async fn store_with(records: &[TraitRecord]) -> SqliteTraitStore {
        let pool = init_memory_database().await.unwrap();
        for record in records {
            save_trait(&pool, record).await.unwrap();
        }
        SqliteTraitStore::new(pool).with_page_size(2)
    }

    #[tokio::test]
    async fn test_apply_writes_conversions_and_provenance() {
        let store = store_with(&[
            TraitRecord::quantitative("a", "diameter", 2500.0, "nm"),
            TraitRecord::quantitative("b", "mass", 1.5, "kg"),
            TraitRecord::quantitative("c", "mass", 3.0, "g"),
            TraitRecord::qualitative("d", "colorMorph"),
        ])
        .await;

        let result = apply(&store, &TraitQuery::all(), &registry(), &BatchLimits::default())
            .await
            .unwrap();

        assert_eq!(result.total_traits, 4);
        assert_eq!(result.converted, 2);
        assert_eq!(result.skipped, 2);
        assert!(result.failures.is_empty());

        let a = load_trait(store.pool(), &TraitId::from("a")).await.unwrap().unwrap();
        assert_eq!(a.measurement, Some(2.5));
        assert_eq!(a.unit.as_deref(), Some("um"));
        assert!(a.recent_change_date.is_some());
        assert_eq!(a.logbook.len(), 1);
        assert!(a.logbook[0].ends_with(": Unit converted from nm to um (2500 → 2.5)"));

        let b = load_trait(store.pool(), &TraitId::from("b")).await.unwrap().unwrap();
        assert_eq!(b.measurement, Some(1500.0));
        assert_eq!(b.unit.as_deref(), Some("g"));

        let c = load_trait(store.pool(), &TraitId::from("c")).await.unwrap().unwrap();
        assert!(c.logbook.is_empty());
        assert!(c.recent_change_date.is_none());
    }

    #[tokio::test]
    async fn test_single_update_in_flight() {
        let store = store_with(&[
            TraitRecord::quantitative("a", "mass", 1.0, "mg"),
            TraitRecord::quantitative("b", "mass", 2.0, "mg"),
            TraitRecord::quantitative("c", "mass", 3.0, "mg"),
        ])
        .await;
        let limits = BatchLimits {
            max_in_flight_updates: 1,
            ..Default::default()
        };

        let result = apply(&store, &TraitQuery::all(), &registry(), &limits)
            .await
            .unwrap();
        assert_eq!(result.converted, 3);
    }

    #[test]
    fn test_apply_result_json_shape() {
        let result = ApplyResult {
            total_traits: 2,
            converted: 1,
            skipped: 0,
            failures: vec![ApplyFailure {
                trait_id: TraitId::from("x"),
                reason: "trait no longer exists".to_string(),
            }],
            stopped_early: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failures"][0]["traitId"], "x");
        assert_eq!(json["failures"][0]["reason"], "trait no longer exists");
        assert_eq!(json["stoppedEarly"], false);
    }
}
