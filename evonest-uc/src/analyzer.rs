//! Canonicalization analyzer
//!
//! Pure per-trait decision: given a trait and the registry snapshot, decide
//! whether its measurement must be rescaled to the type's canonical unit.
//! Analyzing a record that was just converted always yields
//! [`SkipReason::AlreadyCanonical`].

use crate::registry::{RegistrySnapshot, TypeRule};
use crate::units::{parse, scale};
use evonest_common::db::TraitRecord;
use serde::Serialize;
use std::fmt;

/// Why a trait is left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    AlreadyCanonical,
    QualitativeType,
    UnparseableUnit,
    UnknownType,
    /// Unit present but measurement missing or not finite
    InvalidMeasurement,
    /// Quantitative type configured without a canonical unit
    NoCanonicalUnit,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::AlreadyCanonical => "already-canonical",
            SkipReason::QualitativeType => "qualitative-type",
            SkipReason::UnparseableUnit => "unparseable-unit",
            SkipReason::UnknownType => "unknown-type",
            SkipReason::InvalidMeasurement => "invalid-measurement",
            SkipReason::NoCanonicalUnit => "no-canonical-unit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of analyzing one trait
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionVerdict {
    Convert {
        new_value: f64,
        new_unit: String,
        delta_power: i32,
    },
    Skip(SkipReason),
}

impl ConversionVerdict {
    pub fn needs_conversion(&self) -> bool {
        matches!(self, ConversionVerdict::Convert { .. })
    }

    pub fn new_value(&self) -> Option<f64> {
        match self {
            ConversionVerdict::Convert { new_value, .. } => Some(*new_value),
            ConversionVerdict::Skip(_) => None,
        }
    }

    pub fn new_unit(&self) -> Option<&str> {
        match self {
            ConversionVerdict::Convert { new_unit, .. } => Some(new_unit),
            ConversionVerdict::Skip(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ConversionVerdict::Convert { .. } => None,
            ConversionVerdict::Skip(reason) => Some(*reason),
        }
    }
}

/// Classify one trait against the snapshot
pub fn analyze(record: &TraitRecord, registry: &RegistrySnapshot) -> ConversionVerdict {
    let canonical = match registry.rule(&record.trait_type) {
        None => return ConversionVerdict::Skip(SkipReason::UnknownType),
        Some(TypeRule::Qualitative) => return ConversionVerdict::Skip(SkipReason::QualitativeType),
        Some(TypeRule::NoCanonicalUnit) => {
            return ConversionVerdict::Skip(SkipReason::NoCanonicalUnit)
        }
        Some(TypeRule::Quantitative(canonical)) => canonical,
    };

    let unit = match record.unit.as_deref() {
        Some(unit) if !unit.is_empty() => unit,
        _ => return ConversionVerdict::Skip(SkipReason::UnparseableUnit),
    };

    if canonical.opaque {
        return if unit == canonical.symbol {
            ConversionVerdict::Skip(SkipReason::AlreadyCanonical)
        } else {
            ConversionVerdict::Skip(SkipReason::UnparseableUnit)
        };
    }

    let power = match parse(unit, &canonical.base).power() {
        Some(power) => power,
        None => return ConversionVerdict::Skip(SkipReason::UnparseableUnit),
    };

    let delta_power = power - canonical.power;
    if delta_power == 0 && unit == canonical.symbol {
        return ConversionVerdict::Skip(SkipReason::AlreadyCanonical);
    }

    let measurement = match record.measurement {
        Some(value) if value.is_finite() => value,
        _ => return ConversionVerdict::Skip(SkipReason::InvalidMeasurement),
    };

    let new_value = scale(measurement, delta_power);
    if !new_value.is_finite() {
        return ConversionVerdict::Skip(SkipReason::InvalidMeasurement);
    }

    ConversionVerdict::Convert {
        new_value,
        new_unit: canonical.symbol.clone(),
        delta_power,
    }
}
