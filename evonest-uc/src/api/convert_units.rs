//! Trait unit conversion endpoints
//!
//! Both endpoints accept the same optional JSON body. An empty body, `null`,
//! or an empty `traitIds` list selects every trait.

use axum::{body::Bytes, extract::State, Json};
use evonest_common::db::TraitId;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::batch::{run_apply, run_preview, ApplyResult, BatchLimits, BatchResult};
use crate::error::{ApiError, ApiResult};
use crate::store::TraitQuery;
use crate::AppState;

/// Request body shared by preview and apply
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertUnitsRequest {
    #[serde(default)]
    pub trait_ids: Option<Vec<TraitId>>,
    #[serde(default)]
    pub max_records: Option<u64>,
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

impl ConvertUnitsRequest {
    fn parse(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let request: Option<Self> = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?;
        Ok(request.unwrap_or_default())
    }

    fn query(&self) -> TraitQuery {
        TraitQuery::by_ids(self.trait_ids.iter().flatten().cloned())
    }

    /// Request values override the service defaults
    fn limits(&self, defaults: &BatchLimits) -> BatchLimits {
        let mut limits = defaults.clone();
        if let Some(max_records) = self.max_records {
            limits.max_records = Some(max_records);
        }
        if let Some(ms) = self.time_budget_ms {
            limits.time_budget = Some(Duration::from_millis(ms));
        }
        limits
    }
}

/// POST /api/traits/convert-units/preview
///
/// Reports what a conversion would change without writing anything.
pub async fn preview_convert_units(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BatchResult>> {
    let request = ConvertUnitsRequest::parse(&body)?;
    let query = request.query();
    info!(
        selected = query.ids().map_or(0, |ids| ids.len()),
        max_records = ?request.max_records,
        "Previewing trait unit conversion"
    );

    let result = run_preview(state.store.as_ref(), &query, &request.limits(&state.limits)).await?;
    Ok(Json(result))
}

/// POST /api/traits/convert-units
///
/// Converts every selected trait whose unit is not canonical.
pub async fn convert_units(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ApplyResult>> {
    let request = ConvertUnitsRequest::parse(&body)?;
    let query = request.query();
    info!(
        selected = query.ids().map_or(0, |ids| ids.len()),
        max_records = ?request.max_records,
        "Applying trait unit conversion"
    );

    let result = run_apply(state.store.as_ref(), &query, &request.limits(&state.limits)).await?;
    Ok(Json(result))
}
