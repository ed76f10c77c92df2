//! Trait store abstraction
//!
//! The conversion engine only ever scans traits and updates them by id.
//! [`SqliteTraitStore`] is the production implementation; tests wrap it to
//! inject failures.

mod sqlite;

pub use sqlite::{SqliteTraitStore, DEFAULT_PAGE_SIZE};

use crate::error::ConversionError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use evonest_common::db::{TraitId, TraitRecord};
use futures::stream::BoxStream;

/// Stream of traits in ascending id order
pub type TraitStream<'a> = BoxStream<'a, Result<TraitRecord, ConversionError>>;

/// Which traits a batch covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitQuery {
    ids: Vec<TraitId>,
}

impl TraitQuery {
    /// Every trait in the store
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the listed traits; an empty list means all traits
    pub fn by_ids(ids: impl IntoIterator<Item = TraitId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// `None` when the query covers the whole store
    pub fn ids(&self) -> Option<&[TraitId]> {
        if self.ids.is_empty() {
            None
        } else {
            Some(&self.ids)
        }
    }
}

/// Field changes written for one converted trait
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionUpdate {
    pub measurement: f64,
    pub unit: String,
    pub changed_at: DateTime<Utc>,
    /// Appended to the trait's logbook
    pub logbook_entry: String,
}

impl ConversionUpdate {
    pub fn new(
        old_value: Option<f64>,
        old_unit: Option<&str>,
        new_value: f64,
        new_unit: impl Into<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        let unit = new_unit.into();
        let old_value = old_value.map_or_else(|| "null".to_string(), |v| v.to_string());
        let logbook_entry = format!(
            "{}: Unit converted from {} to {} ({} → {})",
            changed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            old_unit.unwrap_or("null"),
            unit,
            old_value,
            new_value
        );

        Self {
            measurement: new_value,
            unit,
            changed_at,
            logbook_entry,
        }
    }
}

/// A trait type and the smallest trait id carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeUsage {
    pub trait_type: String,
    pub first_id: TraitId,
}

/// Read/update access to the trait collection
#[async_trait]
pub trait TraitStore: Send + Sync {
    /// Stream the traits matched by `query`, paging through the collection
    fn scan<'a>(&'a self, query: &'a TraitQuery) -> TraitStream<'a>;

    /// Distinct trait types referenced by `query`
    async fn distinct_types(&self, query: &TraitQuery) -> Result<Vec<TypeUsage>, ConversionError>;

    /// Write one conversion; `Ok(false)` when the trait no longer exists
    async fn apply_conversion(
        &self,
        id: &TraitId,
        update: &ConversionUpdate,
    ) -> Result<bool, ConversionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_id_list_means_all() {
        assert_eq!(TraitQuery::all().ids(), None);
        assert_eq!(TraitQuery::by_ids(Vec::new()).ids(), None);

        let query = TraitQuery::by_ids(vec![TraitId::from("a"), TraitId::from("b")]);
        assert_eq!(query.ids().map(|ids| ids.len()), Some(2));
    }

    #[test]
    fn test_logbook_entry_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let update = ConversionUpdate::new(Some(2500.0), Some("nm"), 2.5, "um", at);
        assert_eq!(
            update.logbook_entry,
            "2024-03-01T12:00:00.000Z: Unit converted from nm to um (2500 → 2.5)"
        );
        assert_eq!(update.unit, "um");
        assert_eq!(update.measurement, 2.5);
    }
}
