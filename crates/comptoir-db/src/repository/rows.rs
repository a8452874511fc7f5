//! Row shapes shared by several repositories.
//!
//! `daily_history` is written by the ticket repository (use a ticket), the
//! history repository (append, reclassify) and read by the report repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection};

use comptoir_core::{EntryKind, HistoryEntry, LedgerEntry};

use crate::error::DbResult;

pub(crate) const HISTORY_COLUMNS: &str = "id, ticket_id, kind, quantity, reason, code, ticket_code, \
     business_date, created_at, report_id";

#[derive(Debug, FromRow)]
pub(crate) struct HistoryRow {
    id: String,
    ticket_id: String,
    kind: EntryKind,
    quantity: i64,
    reason: Option<String>,
    code: Option<String>,
    ticket_code: Option<String>,
    business_date: NaiveDate,
    created_at: DateTime<Utc>,
    report_id: Option<String>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry {
            entry: LedgerEntry::from_stored(
                row.kind,
                row.reason.as_deref(),
                row.code.as_deref(),
                row.ticket_code.as_deref(),
            ),
            id: row.id,
            ticket_id: row.ticket_id,
            quantity: row.quantity,
            business_date: row.business_date,
            created_at: row.created_at,
            report_id: row.report_id,
        }
    }
}

pub(crate) async fn insert_history(conn: &mut SqliteConnection, entry: &HistoryEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_history (
            id, ticket_id, kind, quantity, reason, code,
            business_date, created_at, report_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.ticket_id)
    .bind(entry.kind())
    .bind(entry.quantity)
    .bind(entry.entry.reason().map(|r| r.as_str().to_string()))
    .bind(entry.code())
    .bind(entry.business_date)
    .bind(entry.created_at)
    .bind(&entry.report_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_history(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<HistoryEntry>> {
    let sql = format!("SELECT {HISTORY_COLUMNS} FROM daily_history WHERE id = ?1");
    let row: Option<HistoryRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(HistoryEntry::from))
}
