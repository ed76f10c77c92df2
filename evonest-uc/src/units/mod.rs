//! SI prefix handling: prefix table, unit parser and power-of-ten scaling

pub mod parser;
pub mod prefix;
pub mod scale;

pub use parser::{decompose, parse, UnitParse};
pub use prefix::{power_of, Prefix, PREFIXES};
pub use scale::scale;
