//! Ticket types, stock and the code pool.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use comptoir_core::ledger::BrokenReason;
use comptoir_core::{HistoryEntry, Money, StockUpdate, TicketType};

use crate::error::{ApiError, ApiResult};
use crate::state::{business_today, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}/stock", post(add_stock))
        .route("/api/tickets/{id}/codes", post(import_codes))
        .route("/api/tickets/{id}/use", post(use_ticket))
        .route("/api/tickets/{id}/broken", post(mark_broken))
        .route("/api/tickets/{id}/stock-updates", get(list_stock_updates))
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub duration: String,
    pub price: Money,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ImportCodesRequest {
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCodesResponse {
    /// Codes actually added to the pool.
    pub imported: i64,
    pub stock_update: Option<StockUpdate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UseTicketResponse {
    pub success: bool,
    pub code: String,
    pub stock: i64,
    pub entry_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkBrokenRequest {
    pub reason: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

pub async fn list_tickets(State(state): State<AppState>) -> ApiResult<Json<Vec<TicketType>>> {
    Ok(Json(state.db.tickets().list().await?))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    Json(body): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<TicketType>)> {
    let ticket = state.db.tickets().create(&body.duration, body.price).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn add_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddStockRequest>,
) -> ApiResult<Json<StockUpdate>> {
    Ok(Json(state.db.tickets().add_stock(&id, body.amount).await?))
}

/// Codes come from the dashboard's PDF extraction; parsing stays client-side.
pub async fn import_codes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ImportCodesRequest>,
) -> ApiResult<Json<ImportCodesResponse>> {
    if body.codes.is_empty() {
        return Err(ApiError::validation("codes is required"));
    }
    let update = state.db.tickets().import_codes(&id, &body.codes).await?;
    Ok(Json(ImportCodesResponse {
        imported: update.as_ref().map_or(0, |u| u.amount),
        stock_update: update,
    }))
}

pub async fn use_ticket(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<UseTicketResponse>> {
    let issued = state.db.tickets().use_ticket(&id, business_today()).await?;
    Ok(Json(UseTicketResponse {
        success: true,
        code: issued.code,
        stock: issued.stock,
        entry_id: issued.entry.id,
    }))
}

/// Breakage does not touch stock.
pub async fn mark_broken(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MarkBrokenRequest>,
) -> ApiResult<(StatusCode, Json<HistoryEntry>)> {
    let reason = BrokenReason::parse_required(body.reason.as_deref())?;
    if !reason.is_recognized() {
        debug!(ticket_id = %id, reason = reason.as_str(), "Free-text breakage reason");
    }
    let code = body.code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let entry = state
        .db
        .history()
        .mark_broken(&id, reason, code, body.date.unwrap_or_else(business_today))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_stock_updates(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StockUpdate>>> {
    if state.db.tickets().get(&id).await?.is_none() {
        return Err(ApiError::not_found("Ticket type", &id));
    }
    Ok(Json(state.db.tickets().list_stock_updates(&id).await?))
}
