//! # Ticket Repository
//!
//! Ticket types, their stock counter, the code pool and the stock log.
//!
//! ## Using a Ticket
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  use_ticket(t1, day)                     one transaction               │
//! │                                                                         │
//! │  1. UPDATE ticket_types SET stock = stock - 1                          │
//! │       WHERE id = t1 AND stock > 0       ── 0 rows? ──► OutOfStock      │
//! │                                                        (or NotFound)    │
//! │  2. oldest 'available' code of t1 ──► mark 'issued'                    │
//! │       pool empty? ──► generate T-XXXXXXXX, insert as 'issued'          │
//! │                                                                         │
//! │  3. INSERT daily_history (USED, code, day)                             │
//! │                                                                         │
//! │  4. COMMIT                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard in step 1 is what keeps two concurrent clicks from overselling:
//! the stock check and the decrement are the same statement.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use comptoir_core::code::{generate_code, normalize_import};
use comptoir_core::validation::{validate_code, validate_duration_label, validate_positive_amount, validate_price};
use comptoir_core::{CoreError, HistoryEntry, LedgerEntry, Money, StockSource, StockUpdate, TicketType};

use super::rows::insert_history;
use crate::error::{DbError, DbResult};
use crate::pool::begin_write;

/// Attempts at generating a code nobody holds before giving up.
const MAX_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, FromRow)]
struct TicketRow {
    id: String,
    duration: String,
    price: i64,
    stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for TicketType {
    fn from(row: TicketRow) -> Self {
        TicketType {
            id: row.id,
            duration: row.duration,
            price: Money::from_minor(row.price),
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockUpdateRow {
    id: String,
    ticket_id: String,
    amount: i64,
    previous_stock: i64,
    new_stock: i64,
    source: StockSource,
    created_at: DateTime<Utc>,
}

impl From<StockUpdateRow> for StockUpdate {
    fn from(row: StockUpdateRow) -> Self {
        StockUpdate {
            id: row.id,
            ticket_id: row.ticket_id,
            amount: row.amount,
            previous_stock: row.previous_stock,
            new_stock: row.new_stock,
            source: row.source,
            created_at: row.created_at,
        }
    }
}

/// Outcome of a successful [`TicketRepository::use_ticket`].
#[derive(Debug, Clone)]
pub struct IssuedTicket {
    pub code: String,
    /// Stock left after the decrement.
    pub stock: i64,
    /// The USED row that was appended.
    pub entry: HistoryEntry,
}

/// Repository for ticket types and their stock.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    /// Creates a new TicketRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TicketRepository { pool }
    }

    // =========================================================================
    // Ticket types
    // =========================================================================

    /// All ticket types, oldest first.
    pub async fn list(&self) -> DbResult<Vec<TicketType>> {
        let mut conn = self.pool.acquire().await?;
        fetch_tickets(&mut conn).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<TicketType>> {
        let mut conn = self.pool.acquire().await?;
        fetch_ticket(&mut conn, id).await
    }

    /// Creates a ticket type with no stock.
    pub async fn create(&self, duration: &str, price: Money) -> DbResult<TicketType> {
        validate_duration_label(duration)?;
        validate_price("price", price)?;

        let ticket = TicketType::new(duration.trim(), price);
        debug!(id = %ticket.id, duration = %ticket.duration, "Creating ticket type");

        sqlx::query(
            r#"
            INSERT INTO ticket_types (id, duration, price, stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.duration)
        .bind(ticket.price.minor())
        .bind(ticket.stock)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %ticket.id, duration = %ticket.duration, "Ticket type created");
        Ok(ticket)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_types")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Adds `amount` units of stock and logs the replenishment.
    pub async fn add_stock(&self, ticket_id: &str, amount: i64) -> DbResult<StockUpdate> {
        validate_positive_amount("amount", amount)?;

        let mut tx = begin_write(&self.pool).await?;
        let update = bump_stock(&mut tx, ticket_id, amount, StockSource::Manual).await?;
        tx.commit().await?;

        info!(
            ticket_id = %ticket_id,
            amount,
            new_stock = update.new_stock,
            "Stock added"
        );
        Ok(update)
    }

    /// Puts codes into the pool and raises stock by the number accepted.
    ///
    /// Blank and repeated codes in the batch are dropped, and codes already
    /// present in any pool are skipped. Returns `None` when nothing new was
    /// accepted (stock unchanged, nothing logged).
    pub async fn import_codes(&self, ticket_id: &str, codes: &[String]) -> DbResult<Option<StockUpdate>> {
        let codes = normalize_import(codes);
        for code in &codes {
            validate_code(code)?;
        }

        let mut tx = begin_write(&self.pool).await?;
        if fetch_ticket(&mut tx, ticket_id).await?.is_none() {
            return Err(CoreError::TicketNotFound(ticket_id.to_string()).into());
        }

        let now = Utc::now();
        let mut accepted = 0i64;
        for code in &codes {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO ticket_codes (id, ticket_id, code, status, created_at)
                VALUES (?1, ?2, ?3, 'available', ?4)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(ticket_id)
            .bind(code)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            accepted += result.rows_affected() as i64;
        }

        if accepted == 0 {
            debug!(ticket_id = %ticket_id, offered = codes.len(), "No new codes to import");
            return Ok(None);
        }

        let update = bump_stock(&mut tx, ticket_id, accepted, StockSource::Import).await?;
        tx.commit().await?;

        info!(
            ticket_id = %ticket_id,
            offered = codes.len(),
            accepted,
            new_stock = update.new_stock,
            "Codes imported"
        );
        Ok(Some(update))
    }

    /// Consumes one ticket: guarded decrement, code issue, USED row.
    pub async fn use_ticket(&self, ticket_id: &str, business_date: NaiveDate) -> DbResult<IssuedTicket> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let decremented = sqlx::query(
            r#"
            UPDATE ticket_types
            SET stock = stock - 1, updated_at = ?2
            WHERE id = ?1 AND stock > 0
            "#,
        )
        .bind(ticket_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if decremented == 0 {
            let err = match fetch_ticket(&mut tx, ticket_id).await? {
                None => CoreError::TicketNotFound(ticket_id.to_string()),
                Some(_) => CoreError::OutOfStock {
                    ticket_id: ticket_id.to_string(),
                },
            };
            debug!(ticket_id = %ticket_id, error = %err, "Ticket use refused");
            return Err(err.into());
        }

        let code = issue_code(&mut tx, ticket_id, now).await?;
        let entry = HistoryEntry::new(
            ticket_id,
            LedgerEntry::Used {
                code: Some(code.clone()),
            },
            1,
            business_date,
        );
        insert_history(&mut tx, &entry).await?;

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM ticket_types WHERE id = ?1")
            .bind(ticket_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(ticket_id = %ticket_id, code = %code, stock, "Ticket used");
        Ok(IssuedTicket { code, stock, entry })
    }

    /// Replenishment log of a ticket type, most recent first.
    pub async fn list_stock_updates(&self, ticket_id: &str) -> DbResult<Vec<StockUpdate>> {
        let rows: Vec<StockUpdateRow> = sqlx::query_as(
            r#"
            SELECT id, ticket_id, amount, previous_stock, new_stock, source, created_at
            FROM stock_updates
            WHERE ticket_id = ?1
            ORDER BY rowid DESC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockUpdate::from).collect())
    }

    /// Codes still waiting in the pool of a ticket type.
    pub async fn available_codes(&self, ticket_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ticket_codes WHERE ticket_id = ?1 AND status = 'available'",
        )
        .bind(ticket_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Helpers (run on the caller's connection or transaction)
// =============================================================================

pub(crate) async fn fetch_tickets(conn: &mut SqliteConnection) -> DbResult<Vec<TicketType>> {
    let rows: Vec<TicketRow> = sqlx::query_as(
        r#"
        SELECT id, duration, price, stock, created_at, updated_at
        FROM ticket_types
        ORDER BY rowid
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(TicketType::from).collect())
}

pub(crate) async fn fetch_ticket(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<TicketType>> {
    let row: Option<TicketRow> = sqlx::query_as(
        r#"
        SELECT id, duration, price, stock, created_at, updated_at
        FROM ticket_types
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(TicketType::from))
}

/// Gives one unit back. Used when a USED row is returned to stock.
pub(crate) async fn restock_one(conn: &mut SqliteConnection, ticket_id: &str) -> DbResult<i64> {
    let stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE ticket_types
        SET stock = stock + 1, updated_at = ?2
        WHERE id = ?1
        RETURNING stock
        "#,
    )
    .bind(ticket_id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    stock.ok_or_else(|| CoreError::TicketNotFound(ticket_id.to_string()).into())
}

async fn bump_stock(
    conn: &mut SqliteConnection,
    ticket_id: &str,
    amount: i64,
    source: StockSource,
) -> DbResult<StockUpdate> {
    let new_stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE ticket_types
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1
        RETURNING stock
        "#,
    )
    .bind(ticket_id)
    .bind(amount)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    let new_stock = new_stock.ok_or_else(|| CoreError::TicketNotFound(ticket_id.to_string()))?;
    let update = StockUpdate::record(ticket_id, new_stock - amount, amount, source);

    sqlx::query(
        r#"
        INSERT INTO stock_updates (id, ticket_id, amount, previous_stock, new_stock, source, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&update.id)
    .bind(&update.ticket_id)
    .bind(update.amount)
    .bind(update.previous_stock)
    .bind(update.new_stock)
    .bind(update.source)
    .bind(update.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(update)
}

async fn issue_code(conn: &mut SqliteConnection, ticket_id: &str, now: DateTime<Utc>) -> DbResult<String> {
    let pooled: Option<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, code FROM ticket_codes
        WHERE ticket_id = ?1 AND status = 'available'
        ORDER BY rowid
        LIMIT 1
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id, code)) = pooled {
        sqlx::query("UPDATE ticket_codes SET status = 'issued', issued_at = ?2 WHERE id = ?1 AND status = 'available'")
            .bind(&id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        return Ok(code);
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_code();
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO ticket_codes (id, ticket_id, code, status, created_at, issued_at)
            VALUES (?1, ?2, ?3, 'issued', ?4, ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ticket_id)
        .bind(&candidate)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 1 {
            debug!(ticket_id = %ticket_id, code = %candidate, "Pool empty, generated code");
            return Ok(candidate);
        }
    }

    Err(DbError::Internal("could not generate an unused ticket code".to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::scratch::ScratchFile;
    use crate::pool::{Database, DbConfig};
    use std::collections::HashSet;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = setup().await;
        let repo = db.tickets();

        let created = repo.create("1h", Money::from_minor(500)).await.unwrap();
        repo.create("3h", Money::from_minor(1200)).await.unwrap();

        let tickets = repo.list().await.unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].id, created.id);
        assert_eq!(tickets[0].stock, 0);
        assert_eq!(tickets[0].price.minor(), 500);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_duration() {
        let db = setup().await;
        let err = db.tickets().create("  ", Money::from_minor(500)).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_three_uses_then_out_of_stock() {
        let db = setup().await;
        let repo = db.tickets();
        let ticket = repo.create("1h", Money::from_minor(500)).await.unwrap();
        repo.add_stock(&ticket.id, 3).await.unwrap();

        let mut seen = HashSet::new();
        for expected_stock in [2, 1, 0] {
            let issued = repo.use_ticket(&ticket.id, day()).await.unwrap();
            assert_eq!(issued.stock, expected_stock);
            assert!(seen.insert(issued.code));
        }

        let err = repo.use_ticket(&ticket.id, day()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::OutOfStock { .. })));

        let used = db.history().list_by_date(day()).await.unwrap();
        assert_eq!(used.len(), 3);
        assert_eq!(repo.get(&ticket.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_use_unknown_ticket() {
        let db = setup().await;
        let err = db.tickets().use_ticket("missing", day()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TicketNotFound(_))));
    }

    #[tokio::test]
    async fn test_pool_codes_issued_oldest_first() {
        let db = setup().await;
        let repo = db.tickets();
        let ticket = repo.create("1h", Money::from_minor(500)).await.unwrap();

        let update = repo
            .import_codes(&ticket.id, &codes(&["AAA", "BBB"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.source, StockSource::Import);
        assert_eq!(update.new_stock, 2);

        assert_eq!(repo.use_ticket(&ticket.id, day()).await.unwrap().code, "AAA");
        assert_eq!(repo.use_ticket(&ticket.id, day()).await.unwrap().code, "BBB");
        assert_eq!(repo.available_codes(&ticket.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generated_code_when_pool_empty() {
        let db = setup().await;
        let repo = db.tickets();
        let ticket = repo.create("1h", Money::from_minor(500)).await.unwrap();
        repo.add_stock(&ticket.id, 1).await.unwrap();

        let issued = repo.use_ticket(&ticket.id, day()).await.unwrap();
        assert!(issued.code.starts_with("T-"));
        assert_eq!(issued.entry.code(), Some(issued.code.as_str()));
    }

    #[tokio::test]
    async fn test_import_skips_known_codes() {
        let db = setup().await;
        let repo = db.tickets();
        let one = repo.create("1h", Money::from_minor(500)).await.unwrap();
        let three = repo.create("3h", Money::from_minor(1200)).await.unwrap();

        repo.import_codes(&one.id, &codes(&["AAA", "BBB"])).await.unwrap();

        // AAA is already in a pool, the batch repeats CCC.
        let update = repo
            .import_codes(&three.id, &codes(&["AAA", "CCC", " CCC ", ""]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.amount, 1);
        assert_eq!(update.new_stock, 1);

        let nothing = repo.import_codes(&three.id, &codes(&["CCC"])).await.unwrap();
        assert!(nothing.is_none());
        assert_eq!(repo.get(&three.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_stock_updates_most_recent_first() {
        let db = setup().await;
        let repo = db.tickets();
        let ticket = repo.create("1h", Money::from_minor(500)).await.unwrap();

        repo.add_stock(&ticket.id, 5).await.unwrap();
        repo.add_stock(&ticket.id, 2).await.unwrap();

        let updates = repo.list_stock_updates(&ticket.id).await.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!((updates[0].previous_stock, updates[0].new_stock), (5, 7));
        assert_eq!((updates[1].previous_stock, updates[1].new_stock), (0, 5));
        assert!(updates.iter().all(|u| u.source == StockSource::Manual));
    }

    #[tokio::test]
    async fn test_add_stock_rejects_zero() {
        let db = setup().await;
        let repo = db.tickets();
        let ticket = repo.create("1h", Money::from_minor(500)).await.unwrap();
        assert!(repo.add_stock(&ticket.id, 0).await.is_err());
        assert!(repo.add_stock("missing", 3).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_restock_and_use_on_shared_file() {
        let file = ScratchFile::new();
        let db = Database::new(DbConfig::new(&file.0).max_connections(8)).await.unwrap();
        let ticket = db.tickets().create("1h", Money::from_minor(500)).await.unwrap();
        db.tickets().add_stock(&ticket.id, 100).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let (restock_db, id) = (db.clone(), ticket.id.clone());
            handles.push(tokio::spawn(async move {
                restock_db.tickets().add_stock(&id, 1).await.map(|_| None)
            }));
            let (use_db, id) = (db.clone(), ticket.id.clone());
            handles.push(tokio::spawn(async move {
                use_db.tickets().use_ticket(&id, day()).await.map(|issued| Some(issued.code))
            }));
        }

        let mut issued = HashSet::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Some(code)) => assert!(issued.insert(code)),
                Ok(None) => {}
                Err(e) => panic!("concurrent stock operation failed: {e}"),
            }
        }

        let repo = db.tickets();
        assert_eq!(issued.len(), 100);
        assert_eq!(repo.get(&ticket.id).await.unwrap().unwrap().stock, 100);

        let updates = repo.list_stock_updates(&ticket.id).await.unwrap();
        assert_eq!(updates.len(), 101);
        assert!(updates.iter().all(|u| u.new_stock == u.previous_stock + u.amount));
        db.close().await;
    }
}
