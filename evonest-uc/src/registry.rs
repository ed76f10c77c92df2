//! Trait-type registry snapshot
//!
//! The registry is loaded once per batch and passed explicitly to every
//! analysis call. Nothing is cached between batches, so a configuration
//! change is picked up by the next preview or apply without a restart.

use crate::error::ConversionError;
use crate::units::decompose;
use async_trait::async_trait;
use evonest_common::db::{BaseUnit, DataType, TraitTypeConfig};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Source of the two configuration documents a snapshot is built from
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// `None` when no trait-type document has been stored
    async fn load_trait_types(&self) -> Result<Option<Vec<TraitTypeConfig>>, ConversionError>;

    /// `None` when no base-unit document has been stored
    async fn load_base_units(&self) -> Result<Option<Vec<BaseUnit>>, ConversionError>;
}

/// A trait type's canonical unit, resolved against the base-unit registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUnit {
    /// Unit exactly as configured, the spelling written on conversion
    pub symbol: String,
    /// Unprefixed base (`m` for `um`)
    pub base: String,
    /// Target power of ten (`-6` for `um`)
    pub power: i32,
    /// Compound or unknown unit; only an identical spelling matches
    pub opaque: bool,
}

impl CanonicalUnit {
    /// Resolve `symbol` with `is_base` deciding base-unit membership
    pub fn resolve(symbol: &str, is_base: impl Fn(&str) -> bool) -> Self {
        match decompose(symbol, is_base) {
            Some((power, base)) => Self {
                symbol: symbol.to_string(),
                base: base.to_string(),
                power,
                opaque: false,
            },
            None => Self {
                symbol: symbol.to_string(),
                base: symbol.to_string(),
                power: 0,
                opaque: true,
            },
        }
    }
}

/// Registry entry as the analyzer sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRule {
    Qualitative,
    Quantitative(CanonicalUnit),
    /// Quantitative type configured without a canonical unit
    NoCanonicalUnit,
}

/// Immutable view of the registries for one batch
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    rules: HashMap<String, TypeRule>,
    base_units: HashSet<String>,
}

impl RegistrySnapshot {
    /// Validate and index the registries
    ///
    /// A missing or empty trait-type registry is `ConfigMissing` and a
    /// duplicate type is a `Config` error. Without a base-unit document the
    /// built-in [`default_base_units`] are used.
    pub fn build(
        trait_types: Option<Vec<TraitTypeConfig>>,
        base_units: Option<Vec<BaseUnit>>,
    ) -> Result<Self, ConversionError> {
        let trait_types = match trait_types {
            Some(types) if !types.is_empty() => types,
            _ => return Err(ConversionError::ConfigMissing),
        };

        let base_units: HashSet<String> = match base_units {
            Some(units) if !units.is_empty() => units.into_iter().map(|u| u.symbol).collect(),
            _ => {
                debug!("No base unit registry stored, using defaults");
                default_base_units().into_iter().map(|u| u.symbol).collect()
            }
        };

        let mut rules = HashMap::with_capacity(trait_types.len());
        for config in trait_types {
            let rule = match config.effective_data_type() {
                DataType::Quantitative => {
                    match config.canonical_unit.as_deref().filter(|u| !u.is_empty()) {
                        Some(unit) => {
                            let canonical =
                                CanonicalUnit::resolve(unit, |s| base_units.contains(s));
                            if canonical.opaque {
                                warn!(
                                    trait_type = %config.trait_type,
                                    unit = %canonical.symbol,
                                    "Canonical unit is not a prefixed base unit, only exact matches will be accepted"
                                );
                            }
                            TypeRule::Quantitative(canonical)
                        }
                        None => {
                            warn!(
                                trait_type = %config.trait_type,
                                "Quantitative type has no canonical unit, its traits will be skipped"
                            );
                            TypeRule::NoCanonicalUnit
                        }
                    }
                }
                _ => TypeRule::Qualitative,
            };

            if rules.insert(config.trait_type.clone(), rule).is_some() {
                return Err(ConversionError::Config(format!(
                    "duplicate trait type '{}'",
                    config.trait_type
                )));
            }
        }

        Ok(Self { rules, base_units })
    }

    /// Fetch both documents from `source` and build the snapshot
    pub async fn load<S>(source: &S) -> Result<Self, ConversionError>
    where
        S: RegistrySource + ?Sized,
    {
        let trait_types = source.load_trait_types().await?;
        let base_units = source.load_base_units().await?;
        let snapshot = Self::build(trait_types, base_units)?;
        debug!(types = snapshot.len(), "Loaded trait type registry");
        Ok(snapshot)
    }

    pub fn rule(&self, trait_type: &str) -> Option<&TypeRule> {
        self.rules.get(trait_type)
    }

    pub fn contains(&self, trait_type: &str) -> bool {
        self.rules.contains_key(trait_type)
    }

    pub fn is_base_unit(&self, symbol: &str) -> bool {
        self.base_units.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Base units assumed when the database holds no `baseunits` document
pub fn default_base_units() -> Vec<BaseUnit> {
    [
        ("m", "length"),
        ("g", "mass"),
        ("s", "time"),
        ("A", "electric current"),
        ("K", "temperature"),
        ("mol", "amount of substance"),
        ("cd", "luminous intensity"),
        ("l", "volume"),
        ("L", "volume"),
        ("Hz", "frequency"),
        ("N", "force"),
        ("Pa", "pressure"),
        ("J", "energy"),
        ("W", "power"),
        ("C", "electric charge"),
        ("V", "voltage"),
        ("Ω", "resistance"),
        ("S", "conductance"),
        ("F", "capacitance"),
        ("T", "magnetic flux density"),
        ("Wb", "magnetic flux"),
        ("H", "inductance"),
        ("Bq", "radioactivity"),
        ("Gy", "absorbed dose"),
        ("Sv", "equivalent dose"),
        ("kat", "catalytic activity"),
        ("lm", "luminous flux"),
        ("lx", "illuminance"),
        ("eV", "energy"),
    ]
    .into_iter()
    .map(|(symbol, category)| BaseUnit::new(symbol, category))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(types: Vec<TraitTypeConfig>) -> RegistrySnapshot {
        RegistrySnapshot::build(Some(types), None).unwrap()
    }

    #[test]
    fn test_missing_or_empty_registry_is_config_missing() {
        assert!(matches!(
            RegistrySnapshot::build(None, None),
            Err(ConversionError::ConfigMissing)
        ));
        assert!(matches!(
            RegistrySnapshot::build(Some(vec![]), None),
            Err(ConversionError::ConfigMissing)
        ));
    }

    #[test]
    fn test_prefixed_canonical_unit_resolves_target_power() {
        let snapshot = registry(vec![TraitTypeConfig::quantitative("diameter", "um")]);
        assert_eq!(
            snapshot.rule("diameter"),
            Some(&TypeRule::Quantitative(CanonicalUnit {
                symbol: "um".into(),
                base: "m".into(),
                power: -6,
                opaque: false,
            }))
        );
    }

    #[test]
    fn test_base_unit_with_prefix_like_first_letter() {
        // `Pa` must stay the pascal, `mol` the mole, `cd` the candela
        let snapshot = registry(vec![
            TraitTypeConfig::quantitative("pressure", "Pa"),
            TraitTypeConfig::quantitative("amount", "mol"),
            TraitTypeConfig::quantitative("brightness", "cd"),
        ]);
        for (ty, base) in [("pressure", "Pa"), ("amount", "mol"), ("brightness", "cd")] {
            match snapshot.rule(ty) {
                Some(TypeRule::Quantitative(unit)) => {
                    assert_eq!(unit.base, base);
                    assert_eq!(unit.power, 0);
                }
                other => panic!("unexpected rule {:?}", other),
            }
        }
    }

    #[test]
    fn test_compound_unit_is_opaque() {
        let snapshot = registry(vec![TraitTypeConfig::quantitative("dna", "ng/µl")]);
        match snapshot.rule("dna") {
            Some(TypeRule::Quantitative(unit)) => assert!(unit.opaque),
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn test_quantitative_without_unit_builds() {
        let mut unset = TraitTypeConfig::quantitative("egg_count", "g");
        unset.canonical_unit = None;
        let mut blank = TraitTypeConfig::quantitative("clutch_size", "g");
        blank.canonical_unit = Some(String::new());

        let snapshot = registry(vec![
            TraitTypeConfig::quantitative("diameter", "um"),
            unset,
            blank,
        ]);
        assert_eq!(snapshot.rule("egg_count"), Some(&TypeRule::NoCanonicalUnit));
        assert_eq!(snapshot.rule("clutch_size"), Some(&TypeRule::NoCanonicalUnit));
        assert!(matches!(
            snapshot.rule("diameter"),
            Some(TypeRule::Quantitative(_))
        ));
    }

    #[test]
    fn test_duplicate_type_is_config_error() {
        let result = RegistrySnapshot::build(
            Some(vec![
                TraitTypeConfig::quantitative("mass", "g"),
                TraitTypeConfig::quantitative("mass", "mg"),
            ]),
            None,
        );
        assert!(matches!(result, Err(ConversionError::Config(_))));
    }

    #[test]
    fn test_stored_base_units_replace_defaults() {
        let snapshot = RegistrySnapshot::build(
            Some(vec![TraitTypeConfig::quantitative("mass", "kg")]),
            Some(vec![BaseUnit::new("m", "length")]),
        )
        .unwrap();
        assert!(snapshot.is_base_unit("m"));
        assert!(!snapshot.is_base_unit("g"));
        match snapshot.rule("mass") {
            Some(TypeRule::Quantitative(unit)) => assert!(unit.opaque),
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn test_qualitative_family() {
        let mut categorical = TraitTypeConfig::qualitative("shape");
        categorical.data_type = Some(DataType::Categorical);
        let snapshot = registry(vec![TraitTypeConfig::qualitative("colorMorph"), categorical]);
        assert_eq!(snapshot.rule("colorMorph"), Some(&TypeRule::Qualitative));
        assert_eq!(snapshot.rule("shape"), Some(&TypeRule::Qualitative));
        assert!(snapshot.rule("unknown").is_none());
        assert_eq!(snapshot.len(), 2);
    }
}
