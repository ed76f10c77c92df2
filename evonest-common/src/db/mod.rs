//! Database models and queries

pub mod config_docs;
pub mod init;
pub mod models;
pub mod settings;
pub mod traits;

pub use init::*;
pub use models::*;
