//! # Daily Report Aggregator
//!
//! Rolls a business day's ledger into a report.
//!
//! ```text
//! tickets ──┐
//!           ├──► build_report(date) ──► None            (nothing used/broken)
//! summary ──┘                       └─► ReportDraft    revenue = Σ used × price
//!                                            │          usages  = used + broken
//!                                            ▼
//!                                  persist + settle the day's rows (one tx)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::DaySummary;
use crate::money::Money;
use crate::types::TicketType;

/// Per ticket type line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketUsage {
    pub ticket_id: String,
    /// Duration label at the time of the report.
    pub duration: String,
    pub used: i64,
    pub broken: i64,
    /// `used + broken`.
    pub quantity: i64,
    /// `used × price`. Broken tickets bring nothing in.
    pub revenue: Money,
}

/// A report computed but not yet saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub total_revenue: Money,
    pub usages: Vec<TicketUsage>,
}

/// A saved report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub id: String,
    #[ts(as = "String")]
    pub business_date: NaiveDate,
    pub total_revenue: Money,
    pub usages: Vec<TicketUsage>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Builds the report for `business_date`.
///
/// Returns `None` when no ticket type was used or broken, which the
/// dashboard shows as "nothing to save".
pub fn build_report(business_date: NaiveDate, tickets: &[TicketType], summary: &DaySummary) -> Option<ReportDraft> {
    if !summary.has_activity() {
        return None;
    }

    let usages: Vec<TicketUsage> = tickets
        .iter()
        .filter_map(|ticket| {
            let used = summary.used(&ticket.id);
            let broken = summary.broken(&ticket.id);
            (used + broken > 0).then(|| TicketUsage {
                ticket_id: ticket.id.clone(),
                duration: ticket.duration.clone(),
                used,
                broken,
                quantity: used + broken,
                revenue: ticket.price.multiply_quantity(used),
            })
        })
        .collect();

    if usages.is_empty() {
        // Activity only on ticket types that no longer exist.
        return None;
    }

    Some(ReportDraft {
        business_date,
        total_revenue: usages.iter().map(|u| u.revenue).sum(),
        usages,
    })
}

impl ReportDraft {
    /// Turns the draft into a saved report under `id`.
    pub fn into_report(self, id: impl Into<String>) -> DailyReport {
        DailyReport {
            id: id.into(),
            business_date: self.business_date,
            total_revenue: self.total_revenue,
            usages: self.usages,
            created_at: Utc::now(),
        }
    }
}

/// Month-to-date figures shown above the report list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub report_count: usize,
    pub total_revenue: Money,
}

impl MonthSummary {
    pub fn from_reports(reports: &[DailyReport]) -> Self {
        MonthSummary {
            report_count: reports.len(),
            total_revenue: reports.iter().map(|r| r.total_revenue).sum(),
        }
    }
}
