//! HTTP API handlers

pub mod convert_units;
pub mod health;

pub use convert_units::{convert_units, preview_convert_units, ConvertUnitsRequest};
pub use health::health_routes;
