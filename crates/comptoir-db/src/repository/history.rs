//! # History Repository
//!
//! The append-only daily ledger and its reclassifications.
//!
//! ## Reclassification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  report_used_as_broken(e1, reason)         one transaction             │
//! │                                                                         │
//! │  SELECT e1 ──► comptoir_core::ledger::report_used_as_broken(&e1)       │
//! │                 ├── settled?      ──► EntrySettled                     │
//! │                 ├── not USED?     ──► InvalidEntryKind                 │
//! │                 └── successor e2 (BROKEN, same code, same day)         │
//! │  DELETE e1 WHERE report_id IS NULL                                     │
//! │  INSERT e2                                                             │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are never edited in place; the only column ever updated is
//! `report_id`, by the report repository.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use comptoir_core::ledger::{self, BrokenReason};
use comptoir_core::{CoreError, DaySummary, HistoryEntry, LedgerEntry};

use super::rows::{fetch_history, insert_history, HistoryRow, HISTORY_COLUMNS};
use super::tickets::{fetch_ticket, restock_one};
use crate::error::DbResult;
use crate::pool::begin_write;

/// Repository for the daily history.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Creates a new HistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HistoryRepository { pool }
    }

    /// Every row of a business day, settled or not, oldest first.
    pub async fn list_by_date(&self, business_date: NaiveDate) -> DbResult<Vec<HistoryEntry>> {
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM daily_history WHERE business_date = ?1 ORDER BY rowid");
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql)
            .bind(business_date)
            .fetch_all(&self.pool)
            .await?;

        debug!(date = %business_date, count = rows.len(), "Loaded daily history");
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    /// Used and broken counts of the day. Settled rows do not count.
    pub async fn summary(&self, business_date: NaiveDate) -> DbResult<DaySummary> {
        let entries = self.list_by_date(business_date).await?;
        Ok(DaySummary::fold(&entries))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<HistoryEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_history(&mut conn, id).await
    }

    /// Appends a row built from an `AppendHistory` request.
    pub async fn append(&self, entry: HistoryEntry) -> DbResult<HistoryEntry> {
        let mut tx = begin_write(&self.pool).await?;
        if fetch_ticket(&mut tx, &entry.ticket_id).await?.is_none() {
            return Err(CoreError::TicketNotFound(entry.ticket_id.clone()).into());
        }
        insert_history(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(
            id = %entry.id,
            ticket_id = %entry.ticket_id,
            kind = %entry.kind(),
            quantity = entry.quantity,
            "History entry appended"
        );
        Ok(entry)
    }

    /// Records a breakage. Stock is not touched.
    pub async fn mark_broken(
        &self,
        ticket_id: &str,
        reason: BrokenReason,
        code: Option<String>,
        business_date: NaiveDate,
    ) -> DbResult<HistoryEntry> {
        let entry = HistoryEntry::new(ticket_id, LedgerEntry::Broken { code, reason }, 1, business_date);
        self.append(entry).await
    }

    /// Deletes an unsettled row.
    pub async fn delete(&self, id: &str) -> DbResult<HistoryEntry> {
        let mut tx = begin_write(&self.pool).await?;
        let entry = load(&mut tx, id).await?;
        ledger::check_deletable(&entry)?;
        remove_unsettled(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(id = %id, ticket_id = %entry.ticket_id, "History entry deleted");
        Ok(entry)
    }

    /// USED → BROKEN with `reason`, keeping the code.
    pub async fn report_used_as_broken(&self, id: &str, reason: BrokenReason) -> DbResult<HistoryEntry> {
        let mut tx = begin_write(&self.pool).await?;
        let entry = load(&mut tx, id).await?;
        let successor = ledger::report_used_as_broken(&entry, reason)?;
        replace(&mut tx, &entry, &successor).await?;
        tx.commit().await?;

        info!(from = %id, to = %successor.id, "Used entry reported as broken");
        Ok(successor)
    }

    /// BROKEN → USED, keeping the code. The reason is dropped.
    pub async fn cancel_broken(&self, id: &str) -> DbResult<HistoryEntry> {
        let mut tx = begin_write(&self.pool).await?;
        let entry = load(&mut tx, id).await?;
        let successor = ledger::cancel_broken(&entry)?;
        replace(&mut tx, &entry, &successor).await?;
        tx.commit().await?;

        info!(from = %id, to = %successor.id, "Broken entry cancelled");
        Ok(successor)
    }

    /// Removes a USED row and gives its unit back. Returns the new stock.
    ///
    /// The issued code stays issued and is never handed out again.
    pub async fn return_to_stock(&self, id: &str) -> DbResult<i64> {
        let mut tx = begin_write(&self.pool).await?;
        let entry = load(&mut tx, id).await?;
        ledger::check_returnable(&entry)?;
        remove_unsettled(&mut tx, &entry).await?;
        let stock = restock_one(&mut tx, &entry.ticket_id).await?;
        tx.commit().await?;

        info!(id = %id, ticket_id = %entry.ticket_id, stock, "Ticket returned to stock");
        Ok(stock)
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<HistoryEntry> {
    fetch_history(conn, id)
        .await?
        .ok_or_else(|| CoreError::HistoryEntryNotFound(id.to_string()).into())
}

async fn remove_unsettled(conn: &mut SqliteConnection, entry: &HistoryEntry) -> DbResult<()> {
    let removed = sqlx::query("DELETE FROM daily_history WHERE id = ?1 AND report_id IS NULL")
        .bind(&entry.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(CoreError::EntrySettled(entry.id.clone()).into());
    }
    Ok(())
}

async fn replace(conn: &mut SqliteConnection, entry: &HistoryEntry, successor: &HistoryEntry) -> DbResult<()> {
    remove_unsettled(conn, entry).await?;
    insert_history(conn, successor).await
}

// =============================================================================
// Unit Tests
// =============================================================================
