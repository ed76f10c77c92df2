//! Error types for evonest-uc
//!
//! [`ConversionError`] covers the batch-fatal failures of the conversion
//! engine. Per-record outcomes are not errors: they are
//! [`SkipReason`](crate::analyzer::SkipReason) values or
//! [`ApplyFailure`](crate::batch::ApplyFailure) entries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evonest_common::db::TraitId;
use serde_json::json;
use thiserror::Error;

/// Batch-fatal conversion errors
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Trait-type registry absent or empty
    #[error("Trait types configuration not found")]
    ConfigMissing,

    /// Registry present but inconsistent
    #[error("Invalid trait types configuration: {0}")]
    Config(String),

    /// A trait references a type the registry does not define
    #[error("Trait {trait_id} has unknown type '{trait_type}'")]
    UnknownTraitType { trait_id: TraitId, trait_type: String },

    /// Trait store could not be read
    #[error("Trait store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ConversionError {
    /// Stable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ConversionError::ConfigMissing => "CONFIG_MISSING",
            ConversionError::Config(_) => "CONFIG_ERROR",
            ConversionError::UnknownTraitType { .. } => "UNKNOWN_TRAIT_TYPE",
            ConversionError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<evonest_common::Error> for ConversionError {
    fn from(err: evonest_common::Error) -> Self {
        use evonest_common::Error;
        match err {
            Error::Config(msg) => ConversionError::Config(msg),
            Error::Json(e) => ConversionError::Config(format!("malformed document: {}", e)),
            Error::Toml(e) => ConversionError::Config(e.to_string()),
            other => ConversionError::StoreUnavailable(other.to_string()),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conversion engine failure
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conversion(ref err) => {
                let status = match err {
                    ConversionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
