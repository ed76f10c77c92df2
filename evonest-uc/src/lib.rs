//! evonest-uc library - Unit canonicalization service
//!
//! Rescales stored trait measurements to the canonical unit of their trait
//! type. Conversions are previewed first and applied as a best-effort batch.

use axum::Router;
use std::sync::Arc;

pub mod analyzer;
pub mod api;
pub mod batch;
pub mod error;
pub mod registry;
pub mod store;
pub mod units;

pub use batch::BatchLimits;
pub use error::{ApiError, ConversionError};
pub use store::SqliteTraitStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteTraitStore>,
    /// Defaults for every batch; a request may override the record and time limits
    pub limits: BatchLimits,
}

impl AppState {
    pub fn new(store: SqliteTraitStore, limits: BatchLimits) -> Self {
        Self {
            store: Arc::new(store),
            limits,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    let conversion = Router::new()
        .route(
            "/api/traits/convert-units/preview",
            post(api::preview_convert_units),
        )
        .route("/api/traits/convert-units", post(api::convert_units));

    Router::new()
        .merge(conversion)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
