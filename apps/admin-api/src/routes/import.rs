//! Import cost estimates.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use comptoir_core::import::{ImportEstimate, ImportEstimateRequest};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/import/estimate", post(estimate))
}

/// Validates locally, then asks the external estimator.
pub async fn estimate(
    State(state): State<AppState>,
    Json(body): Json<ImportEstimateRequest>,
) -> ApiResult<Json<ImportEstimate>> {
    body.validate()?;
    let estimator = state.estimator()?;
    Ok(Json(estimator.estimate(&body).await?))
}
