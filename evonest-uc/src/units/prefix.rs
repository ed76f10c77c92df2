//! SI decimal prefix table
//!
//! Symbols are case-sensitive (`m` is milli, `M` is mega). Micro has three
//! accepted spellings: the micro sign U+00B5, Greek small mu U+03BC, and the
//! ASCII fallback `u` used by instrument exports.

/// One SI prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Power of ten the prefix multiplies by
    pub power: i32,
}

const fn prefix(symbol: &'static str, name: &'static str, power: i32) -> Prefix {
    Prefix {
        symbol,
        name,
        power,
    }
}

/// All known prefixes, longest symbol first
pub const PREFIXES: &[Prefix] = &[
    prefix("da", "deca", 1),
    prefix("Y", "yotta", 24),
    prefix("Z", "zetta", 21),
    prefix("E", "exa", 18),
    prefix("P", "peta", 15),
    prefix("T", "tera", 12),
    prefix("G", "giga", 9),
    prefix("M", "mega", 6),
    prefix("k", "kilo", 3),
    prefix("h", "hecto", 2),
    prefix("d", "deci", -1),
    prefix("c", "centi", -2),
    prefix("m", "milli", -3),
    prefix("\u{00B5}", "micro", -6),
    prefix("\u{03BC}", "micro", -6),
    prefix("u", "micro", -6),
    prefix("n", "nano", -9),
    prefix("p", "pico", -12),
    prefix("f", "femto", -15),
    prefix("a", "atto", -18),
    prefix("z", "zepto", -21),
    prefix("y", "yocto", -24),
];

/// Power of ten for a prefix symbol; the empty symbol is power 0
pub fn power_of(symbol: &str) -> Option<i32> {
    if symbol.is_empty() {
        return Some(0);
    }
    PREFIXES.iter().find(|p| p.symbol == symbol).map(|p| p.power)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_symbols_are_unique() {
        let symbols: HashSet<&str> = PREFIXES.iter().map(|p| p.symbol).collect();
        assert_eq!(symbols.len(), PREFIXES.len());
    }

    #[test]
    fn test_table_is_longest_symbol_first() {
        let lengths: Vec<usize> = PREFIXES.iter().map(|p| p.symbol.chars().count()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]), "{:?}", lengths);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(power_of(""), Some(0));
        assert_eq!(power_of("k"), Some(3));
        assert_eq!(power_of("m"), Some(-3));
        assert_eq!(power_of("M"), Some(6));
        assert_eq!(power_of("da"), Some(1));
        assert_eq!(power_of("K"), None);
    }

    #[test]
    fn test_all_micro_spellings() {
        assert_eq!(power_of("µ"), Some(-6));
        assert_eq!(power_of("μ"), Some(-6));
        assert_eq!(power_of("u"), Some(-6));
    }
}
