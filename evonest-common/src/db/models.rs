//! Database models
//!
//! Field names serialize in camelCase to match the documents the web
//! frontend and the experiment parsers exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `config.config_type` key holding the trait-type registry
pub const TRAIT_TYPES_CONFIG: &str = "traittypes";

/// `config.config_type` key holding the base-unit registry
pub const BASE_UNITS_CONFIG: &str = "baseunits";

/// Opaque trait identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitId(pub String);

impl TraitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One stored measurement of a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitRecord {
    pub id: TraitId,

    /// Trait-type registry key
    #[serde(rename = "type")]
    pub trait_type: String,

    /// Absent for qualitative traits
    #[serde(default)]
    pub measurement: Option<f64>,

    /// Possibly SI-prefixed unit symbol
    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub sample_id: Option<String>,

    /// Observation date exactly as recorded (`2024-03-15`, or a full timestamp)
    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub recent_change_date: Option<DateTime<Utc>>,

    /// Append-only provenance entries
    #[serde(default)]
    pub logbook: Vec<String>,

    /// Free-form fields written by experiment parsers
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TraitRecord {
    /// Minimal quantitative record, mostly useful for ingestion and tests
    pub fn quantitative(
        id: impl Into<String>,
        trait_type: impl Into<String>,
        measurement: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: TraitId::new(id),
            trait_type: trait_type.into(),
            measurement: Some(measurement),
            unit: Some(unit.into()),
            sample_id: None,
            date: None,
            recent_change_date: None,
            logbook: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Record without measurement or unit
    pub fn qualitative(id: impl Into<String>, trait_type: impl Into<String>) -> Self {
        Self {
            measurement: None,
            unit: None,
            ..Self::quantitative(id, trait_type, 0.0, "")
        }
    }

    pub fn with_sample(mut self, sample_id: impl Into<String>) -> Self {
        self.sample_id = Some(sample_id.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Kind of value a trait type records
///
/// Only `quantitative` types carry a unit. The remaining variants are the
/// qualitative family used by the trait-type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Quantitative,
    Qualitative,
    Categorical,
    Boolean,
    Ordinal,
    Multiselect,
}

impl DataType {
    pub fn is_quantitative(self) -> bool {
        matches!(self, DataType::Quantitative)
    }
}

/// Trait-type registry entry
///
/// Accepts both `type`/`canonicalUnit` and the older `value`/`unit` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitTypeConfig {
    #[serde(rename = "type", alias = "value")]
    pub trait_type: String,

    #[serde(default, alias = "unit")]
    pub canonical_unit: Option<String>,

    #[serde(default)]
    pub data_type: Option<DataType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TraitTypeConfig {
    pub fn quantitative(trait_type: impl Into<String>, canonical_unit: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            canonical_unit: Some(canonical_unit.into()),
            data_type: Some(DataType::Quantitative),
            label: None,
            description: None,
        }
    }

    pub fn qualitative(trait_type: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            canonical_unit: None,
            data_type: Some(DataType::Qualitative),
            label: None,
            description: None,
        }
    }

    /// Declared data type, or quantitative exactly when a unit is configured
    pub fn effective_data_type(&self) -> DataType {
        match self.data_type {
            Some(dt) => dt,
            None if self.canonical_unit.is_some() => DataType::Quantitative,
            None => DataType::Qualitative,
        }
    }
}

/// Base-unit registry entry (`m`, `g`, `Pa`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseUnit {
    #[serde(alias = "value")]
    pub symbol: String,

    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BaseUnit {
    pub fn new(symbol: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            category: category.into(),
            label: None,
        }
    }
}
