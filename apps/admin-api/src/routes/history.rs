//! Daily history and its reclassifications.
//!
//! ```text
//!   USED ──report-broken──► BROKEN ──cancel-broken──► USED
//!     │                                                │
//!     └── return-to-stock: row removed, stock + 1 ◄────┘
//! ```
//! Every move is refused once the row belongs to a saved report.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use comptoir_core::ledger::{AppendHistory, BrokenReason};
use comptoir_core::validation::parse_business_date;
use comptoir_core::{DaySummary, HistoryEntry};

use crate::error::ApiResult;
use crate::state::{business_today, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/history", get(list_history).post(append_history))
        .route("/api/history/{id}", delete(delete_entry))
        .route("/api/history/{id}/report-broken", post(report_broken))
        .route("/api/history/{id}/cancel-broken", post(cancel_broken))
        .route("/api/history/{id}/return-to-stock", post(return_to_stock))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub date: Option<String>,
}

/// Parses an optional `YYYY-MM-DD`, defaulting to today.
pub(crate) fn date_or_today(raw: Option<&str>) -> ApiResult<NaiveDate> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => Ok(parse_business_date(d)?),
        None => Ok(business_today()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHistoryResponse {
    pub date: NaiveDate,
    pub entries: Vec<HistoryEntry>,
    pub summary: DaySummary,
}

#[derive(Debug, Deserialize)]
pub struct ReportBrokenRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReturnToStockResponse {
    pub success: bool,
    pub stock: i64,
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<DayHistoryResponse>> {
    let date = date_or_today(query.date.as_deref())?;
    let entries = state.db.history().list_by_date(date).await?;
    let summary = DaySummary::fold(&entries);
    Ok(Json(DayHistoryResponse { date, entries, summary }))
}

pub async fn append_history(
    State(state): State<AppState>,
    Json(body): Json<AppendHistory>,
) -> ApiResult<(StatusCode, Json<HistoryEntry>)> {
    let entry = body.into_entry(business_today())?;
    let entry = state.db.history().append(entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn delete_entry(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<HistoryEntry>> {
    Ok(Json(state.db.history().delete(&id).await?))
}

pub async fn report_broken(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReportBrokenRequest>,
) -> ApiResult<Json<HistoryEntry>> {
    let reason = BrokenReason::parse_required(body.reason.as_deref())?;
    Ok(Json(state.db.history().report_used_as_broken(&id, reason).await?))
}

pub async fn cancel_broken(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<HistoryEntry>> {
    Ok(Json(state.db.history().cancel_broken(&id).await?))
}

pub async fn return_to_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReturnToStockResponse>> {
    let stock = state.db.history().return_to_stock(&id).await?;
    Ok(Json(ReturnToStockResponse { success: true, stock }))
}
