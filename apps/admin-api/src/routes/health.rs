//! Health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use comptoir_db::migrations::migration_status;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub migrations_applied: usize,
    pub migrations_total: usize,
    pub payment_configured: bool,
    pub estimator_configured: bool,
}

/// 200 when the database answers, 503 otherwise. Optional integrations
/// never make the service unhealthy.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let (migrations_total, migrations_applied) = match migration_status(state.db.pool()).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!("Failed to read migration status: {}", e);
            (0, 0)
        }
    };

    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        migrations_applied,
        migrations_total,
        payment_configured: state.paypal.is_some(),
        estimator_configured: state.estimator.is_some(),
    };
    (status, Json(body))
}
