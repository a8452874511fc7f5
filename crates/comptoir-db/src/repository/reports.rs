//! # Report Repository
//!
//! Saves daily reports and settles the history rows they cover.
//!
//! ## Saving a Day
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_for_date(day)                        one transaction             │
//! │                                                                         │
//! │  1. INSERT daily_reports (r, day, 0)        takes the write lock       │
//! │  2. UPDATE daily_history SET report_id = r                             │
//! │       WHERE business_date = day AND report_id IS NULL                  │
//! │       0 rows? ──► ROLLBACK, None ("nothing to save")                   │
//! │  3. SELECT rows of r ──► DaySummary::fold ──► build_report             │
//! │  4. UPDATE total, INSERT usages, COMMIT                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Claiming the rows first means a second save of the same day finds
//! nothing left to claim instead of producing a duplicate report.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use comptoir_core::report::build_report;
use comptoir_core::{DailyReport, DaySummary, HistoryEntry, Money, TicketUsage, ValidationError};

use super::rows::{HistoryRow, HISTORY_COLUMNS};
use super::tickets::fetch_tickets;
use crate::error::DbResult;
use crate::pool::begin_write;

#[derive(Debug, FromRow)]
struct ReportRow {
    id: String,
    business_date: NaiveDate,
    total_revenue: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UsageRow {
    report_id: String,
    ticket_id: String,
    duration: String,
    used: i64,
    broken: i64,
    quantity: i64,
    revenue: i64,
}

impl UsageRow {
    fn into_usage(self) -> (String, TicketUsage) {
        (
            self.report_id,
            TicketUsage {
                ticket_id: self.ticket_id,
                duration: self.duration,
                used: self.used,
                broken: self.broken,
                quantity: self.quantity,
                revenue: Money::from_minor(self.revenue),
            },
        )
    }
}

/// Repository for daily reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Saves the report of `business_date` and settles its rows.
    ///
    /// Returns `None` when no ticket type was used or broken that day (or
    /// everything was already settled). Nothing is written in that case.
    pub async fn save_for_date(&self, business_date: NaiveDate) -> DbResult<Option<DailyReport>> {
        let report_id = Uuid::new_v4().to_string();
        let mut tx = begin_write(&self.pool).await?;

        sqlx::query("INSERT INTO daily_reports (id, business_date, total_revenue, created_at) VALUES (?1, ?2, 0, ?3)")
            .bind(&report_id)
            .bind(business_date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let claimed = sqlx::query(
            "UPDATE daily_history SET report_id = ?1 WHERE business_date = ?2 AND report_id IS NULL",
        )
        .bind(&report_id)
        .bind(business_date)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            debug!(date = %business_date, "Nothing to save");
            return Ok(None);
        }

        // Fold the claimed rows as they were before settlement.
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM daily_history WHERE report_id = ?1");
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql).bind(&report_id).fetch_all(&mut *tx).await?;
        let entries: Vec<HistoryEntry> = rows
            .into_iter()
            .map(HistoryEntry::from)
            .map(|mut e| {
                e.report_id = None;
                e
            })
            .collect();
        let summary = DaySummary::fold(&entries);

        let tickets = fetch_tickets(&mut tx).await?;
        let Some(draft) = build_report(business_date, &tickets, &summary) else {
            debug!(date = %business_date, "No usage to report");
            return Ok(None);
        };

        let report = draft.into_report(report_id);
        sqlx::query("UPDATE daily_reports SET total_revenue = ?2, created_at = ?3 WHERE id = ?1")
            .bind(&report.id)
            .bind(report.total_revenue.minor())
            .bind(report.created_at)
            .execute(&mut *tx)
            .await?;
        insert_usages(&mut tx, &report).await?;

        tx.commit().await?;

        info!(
            id = %report.id,
            date = %business_date,
            settled = claimed,
            total_revenue = report.total_revenue.minor(),
            "Daily report saved"
        );
        Ok(Some(report))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<DailyReport>> {
        let row: Option<ReportRow> = sqlx::query_as(
            "SELECT id, business_date, total_revenue, created_at FROM daily_reports WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let usages: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT report_id, ticket_id, duration, used, broken, quantity, revenue
            FROM daily_report_usages
            WHERE report_id = ?1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(assemble(
            row,
            usages.into_iter().map(|u| u.into_usage().1).collect(),
        )))
    }

    /// Reports of a calendar month, most recent business day first.
    pub async fn list_for_month(&self, year: i32, month: u32) -> DbResult<Vec<DailyReport>> {
        let (from, until) = month_bounds(year, month)?;

        let rows: Vec<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, business_date, total_revenue, created_at
            FROM daily_reports
            WHERE business_date >= ?1 AND business_date < ?2
            ORDER BY business_date DESC, rowid DESC
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        let usage_rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT u.report_id, u.ticket_id, u.duration, u.used, u.broken, u.quantity, u.revenue
            FROM daily_report_usages u
            JOIN daily_reports r ON r.id = u.report_id
            WHERE r.business_date >= ?1 AND r.business_date < ?2
            ORDER BY u.report_id, u.position
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        let mut usages: HashMap<String, Vec<TicketUsage>> = HashMap::new();
        for row in usage_rows {
            let (report_id, usage) = row.into_usage();
            usages.entry(report_id).or_default().push(usage);
        }

        debug!(year, month, count = rows.len(), "Loaded month reports");
        Ok(rows
            .into_iter()
            .map(|row| {
                let usages = usages.remove(&row.id).unwrap_or_default();
                assemble(row, usages)
            })
            .collect())
    }
}

fn assemble(row: ReportRow, usages: Vec<TicketUsage>) -> DailyReport {
    DailyReport {
        id: row.id,
        business_date: row.business_date,
        total_revenue: Money::from_minor(row.total_revenue),
        usages,
        created_at: row.created_at,
    }
}

fn month_bounds(year: i32, month: u32) -> DbResult<(NaiveDate, NaiveDate)> {
    let invalid = || ValidationError::InvalidFormat {
        field: "month".to_string(),
        reason: "expected YYYY-MM".to_string(),
    };
    let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let until = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid)?;
    Ok((from, until))
}

async fn insert_usages(conn: &mut SqliteConnection, report: &DailyReport) -> DbResult<()> {
    for (position, usage) in report.usages.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO daily_report_usages (
                report_id, ticket_id, duration, used, broken, quantity, revenue, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&report.id)
        .bind(&usage.ticket_id)
        .bind(&usage.duration)
        .bind(usage.used)
        .bind(usage.broken)
        .bind(usage.quantity)
        .bind(usage.revenue.minor())
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use comptoir_core::ledger::BrokenReason;
    use comptoir_core::CoreError;
    use crate::error::DbError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let one = db.tickets().create("1h", Money::from_minor(500)).await.unwrap();
        let three = db.tickets().create("3h", Money::from_minor(1200)).await.unwrap();
        db.tickets().add_stock(&one.id, 10).await.unwrap();
        db.tickets().add_stock(&three.id, 10).await.unwrap();
        (db, one.id, three.id)
    }

    #[tokio::test]
    async fn test_nothing_to_save() {
        let (db, _, _) = setup().await;
        assert!(db.reports().save_for_date(day(15)).await.unwrap().is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_reports")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_save_settles_the_day() {
        let (db, one, three) = setup().await;
        db.tickets().use_ticket(&one, day(15)).await.unwrap();
        db.tickets().use_ticket(&one, day(15)).await.unwrap();
        db.tickets().use_ticket(&three, day(15)).await.unwrap();
        let broken = db
            .history()
            .mark_broken(&three, BrokenReason::NetworkIssue, None, day(15))
            .await
            .unwrap();
        // Another day stays open.
        db.tickets().use_ticket(&one, day(16)).await.unwrap();

        let report = db.reports().save_for_date(day(15)).await.unwrap().unwrap();
        assert_eq!(report.total_revenue.minor(), 2 * 500 + 1200);
        assert_eq!(report.usages.len(), 2);
        assert_eq!(report.usages[0].ticket_id, one);
        assert_eq!((report.usages[1].used, report.usages[1].broken), (1, 1));

        let summary = db.history().summary(day(15)).await.unwrap();
        assert!(!summary.has_activity());
        assert_eq!(db.history().summary(day(16)).await.unwrap().used(&one), 1);

        // Settled rows are frozen, and a second save finds nothing.
        let err = db.history().delete(&broken.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::EntrySettled(_))));
        assert!(db.reports().save_for_date(day(15)).await.unwrap().is_none());

        let loaded = db.reports().get(&report.id).await.unwrap().unwrap();
        assert_eq!(loaded.usages, report.usages);
    }

    #[tokio::test]
    async fn test_month_listing() {
        let (db, one, _) = setup().await;
        db.tickets().use_ticket(&one, day(1)).await.unwrap();
        db.reports().save_for_date(day(1)).await.unwrap();
        db.tickets().use_ticket(&one, day(20)).await.unwrap();
        db.reports().save_for_date(day(20)).await.unwrap();

        let april = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        db.tickets().use_ticket(&one, april).await.unwrap();
        db.reports().save_for_date(april).await.unwrap();

        let march = db.reports().list_for_month(2024, 3).await.unwrap();
        assert_eq!(march.len(), 2);
        assert_eq!(march[0].business_date, day(20));
        assert_eq!(march[0].usages.len(), 1);
        assert_eq!(march[1].total_revenue.minor(), 500);

        assert!(db.reports().list_for_month(2024, 13).await.is_err());
    }
}
