//! Daily reports.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use comptoir_core::validation::parse_month;
use comptoir_core::{DailyReport, MonthSummary};

use crate::error::ApiResult;
use crate::routes::history::date_or_today;
use crate::state::{business_today, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/reports", get(list_reports).post(save_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveReportRequest {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReportResponse {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DailyReport>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReportsResponse {
    pub year: i32,
    pub month: u32,
    pub reports: Vec<DailyReport>,
    pub summary: MonthSummary,
}

/// Saves the report of a day and settles its history.
///
/// A day with no activity is not an error: the dashboard shows the message.
pub async fn save_report(
    State(state): State<AppState>,
    Json(body): Json<SaveReportRequest>,
) -> ApiResult<Json<SaveReportResponse>> {
    let date = date_or_today(body.date.as_deref())?;
    let response = match state.db.reports().save_for_date(date).await? {
        Some(report) => {
            let currency = &state.config.currency;
            let message = format!(
                "Report saved for {}: {}",
                date,
                report.total_revenue.format_with(currency.decimals, &currency.code)
            );
            SaveReportResponse {
                saved: true,
                report: Some(report),
                message,
            }
        }
        None => SaveReportResponse {
            saved: false,
            report: None,
            message: format!("Nothing to save for {}", date),
        },
    };
    Ok(Json(response))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<MonthReportsResponse>> {
    let (year, month) = match query.month.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => parse_month(raw)?,
        None => current_month(business_today()),
    };
    let reports = state.db.reports().list_for_month(year, month).await?;
    let summary = MonthSummary::from_reports(&reports);
    Ok(Json(MonthReportsResponse {
        year,
        month,
        reports,
        summary,
    }))
}

fn current_month(today: NaiveDate) -> (i32, u32) {
    (today.year(), today.month())
}
