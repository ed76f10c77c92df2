//! Unit string parsing against a known base unit
//!
//! Only the simple `prefix + base` form is recognised. Ratios (`mm/mm`),
//! spelled-out names (`micrometer`) and other legacy spellings must be
//! normalized before they reach this parser; they come back `Unmatched`.

use super::prefix::{power_of, PREFIXES};

/// Outcome of matching a unit string against a base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitParse {
    /// `unit == prefix + base`; `power` is the prefix exponent (0 without prefix)
    Matched { power: i32 },
    Unmatched,
}

impl UnitParse {
    pub fn matched(self) -> bool {
        matches!(self, UnitParse::Matched { .. })
    }

    pub fn power(self) -> Option<i32> {
        match self {
            UnitParse::Matched { power } => Some(power),
            UnitParse::Unmatched => None,
        }
    }
}

/// Match `unit` against `base`, trying prefixes longest symbol first
pub fn parse(unit: &str, base: &str) -> UnitParse {
    if base.is_empty() {
        return UnitParse::Unmatched;
    }
    if unit == base {
        return UnitParse::Matched { power: 0 };
    }

    PREFIXES
        .iter()
        .find(|p| unit.strip_prefix(p.symbol) == Some(base))
        .map(|p| UnitParse::Matched { power: p.power })
        .unwrap_or(UnitParse::Unmatched)
}

/// Split a unit into `(power, base)` when the base is known
///
/// The split leaving the longest known base suffix wins, so `Pa` is the
/// pascal rather than peta-`a`, and `mm` is milli-metre. Units of a single
/// character never carry a prefix.
pub fn decompose<'a>(unit: &'a str, is_base: impl Fn(&str) -> bool) -> Option<(i32, &'a str)> {
    if unit.is_empty() {
        return None;
    }
    if is_base(unit) {
        return Some((0, unit));
    }

    unit.char_indices().skip(1).find_map(|(split, _)| {
        let (prefix, base) = unit.split_at(split);
        match power_of(prefix) {
            Some(power) if is_base(base) => Some((power, base)),
            _ => None,
        }
    })
}
