//! # Evonest Common Library
//!
//! Shared code for the Evonest services including:
//! - Trait and configuration data model
//! - SQLite initialization and settings
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
