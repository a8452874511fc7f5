//! # Order Repository
//!
//! Order snapshots taken when the cart is submitted.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE                                                             │
//! │     └── create(new_order, day) → Order { status: Pending }             │
//! │         number CMD-YYYYMMDD-NNNN, items copied (snapshot pattern)      │
//! │                                                                         │
//! │  2. PAY (provider capture or cash at the counter)                      │
//! │     └── mark_paid(id, reference) → Order { status: Paid }              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Item names and prices are frozen; later catalog edits never touch a
//! submitted order.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use comptoir_core::order::{order_number, order_number_prefix};
use comptoir_core::{CoreError, ItemKind, Money, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;

/// Attempts at claiming an order number before giving up.
const MAX_NUMBER_ATTEMPTS: usize = 3;

const ORDER_COLUMNS: &str = "id, order_number, status, payment_method, subtotal, global_discount, \
     delivery_cost, total, customer_name, notes, payment_reference, created_at, paid_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: i64,
    global_discount: i64,
    delivery_cost: i64,
    total: i64,
    customer_name: Option<String>,
    notes: Option<String>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            status: self.status,
            payment_method: self.payment_method,
            subtotal: Money::from_minor(self.subtotal),
            global_discount: Money::from_minor(self.global_discount),
            delivery_cost: Money::from_minor(self.delivery_cost),
            total: Money::from_minor(self.total),
            customer_name: self.customer_name,
            notes: self.notes,
            payment_reference: self.payment_reference,
            items,
            created_at: self.created_at,
            paid_at: self.paid_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    kind: ItemKind,
    catalog_id: Option<String>,
    name_snapshot: String,
    unit_price: i64,
    quantity: i64,
    discount_amount: i64,
    total_price: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            kind: row.kind,
            catalog_id: row.catalog_id,
            name_snapshot: row.name_snapshot,
            unit_price: Money::from_minor(row.unit_price),
            quantity: row.quantity,
            discount_amount: Money::from_minor(row.discount_amount),
            total_price: Money::from_minor(row.total_price),
        }
    }
}

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists a submitted cart. The order number is the next free one of
    /// `business_date`.
    pub async fn create(&self, order: &NewOrder, business_date: NaiveDate) -> DbResult<Order> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(order, business_date).await {
                Err(err) if err.is_unique_violation() && attempt < MAX_NUMBER_ATTEMPTS => {
                    warn!(attempt, error = %err, "Order number taken, retrying");
                }
                result => return result,
            }
        }
    }

    async fn try_create(&self, order: &NewOrder, business_date: NaiveDate) -> DbResult<Order> {
        let mut tx = begin_write(&self.pool).await?;

        let prefix = order_number_prefix(business_date);
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_number LIKE ?1 || '%'")
            .bind(&prefix)
            .fetch_one(&mut *tx)
            .await?;
        let number = order_number(business_date, taken + 1);
        let created_at = Utc::now();

        debug!(id = %order.id, number = %number, items = order.items.len(), "Creating order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, status, payment_method,
                subtotal, global_discount, delivery_cost, total,
                customer_name, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&order.id)
        .bind(&number)
        .bind(OrderStatus::Pending)
        .bind(order.payment_method)
        .bind(order.subtotal.minor())
        .bind(order.global_discount.minor())
        .bind(order.delivery_cost.minor())
        .bind(order.total.minor())
        .bind(&order.customer_name)
        .bind(&order.notes)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            insert_item(&mut tx, item, position as i64).await?;
        }

        tx.commit().await?;

        info!(
            id = %order.id,
            number = %number,
            total = order.total.minor(),
            method = ?order.payment_method,
            "Order created"
        );

        Ok(Order {
            id: order.id.clone(),
            order_number: number,
            status: OrderStatus::Pending,
            payment_method: order.payment_method,
            subtotal: order.subtotal,
            global_discount: order.global_discount,
            delivery_cost: order.delivery_cost,
            total: order.total,
            customer_name: order.customer_name.clone(),
            notes: order.notes.clone(),
            payment_reference: None,
            items: order.items.clone(),
            created_at,
            paid_at: None,
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, kind, catalog_id, name_snapshot,
                   unit_price, quantity, discount_amount, total_price
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_order(items.into_iter().map(OrderItem::from).collect())))
    }

    /// Most recent orders first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY rowid DESC LIMIT ?1");
        let rows: Vec<OrderRow> = sqlx::query_as(&sql).bind(limit).fetch_all(&self.pool).await?;

        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, kind, catalog_id, name_snapshot,
                   unit_price, quantity, discount_amount, total_price
            FROM order_items
            WHERE order_id IN (SELECT id FROM orders ORDER BY rowid DESC LIMIT ?1)
            ORDER BY order_id, position
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id.clone()).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }

    /// Marks a pending order paid with the provider's reference.
    ///
    /// Capturing the same reference twice returns the paid order unchanged.
    pub async fn mark_paid(&self, id: &str, payment_reference: &str) -> DbResult<Order> {
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, payment_reference = ?3, paid_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Paid)
        .bind(payment_reference)
        .bind(Utc::now())
        .bind(OrderStatus::Pending)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let order = self.get(id).await?.ok_or_else(|| DbError::not_found("Order", id))?;

        if updated == 0 {
            let same_capture = order.status == OrderStatus::Paid
                && order.payment_reference.as_deref() == Some(payment_reference);
            if !same_capture {
                return Err(CoreError::OrderNotPending {
                    order_id: id.to_string(),
                    status: order.status,
                }
                .into());
            }
            debug!(id = %id, "Order already paid with this reference");
            return Ok(order);
        }

        info!(id = %id, number = %order.order_number, reference = %payment_reference, "Order paid");
        Ok(order)
    }
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem, position: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, position, kind, catalog_id, name_snapshot,
            unit_price, quantity, discount_amount, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(position)
    .bind(item.kind)
    .bind(&item.catalog_id)
    .bind(&item.name_snapshot)
    .bind(item.unit_price.minor())
    .bind(item.quantity)
    .bind(item.discount_amount.minor())
    .bind(item.total_price.minor())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use comptoir_core::{Cart, CatalogItem, DiscountDescriptor};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn sample_order() -> NewOrder {
        let mut cart = Cart::new();
        let router = CatalogItem::fixed("p1", "Router", Money::from_minor(2500));
        let line_id = cart.add_item(ItemKind::Product, &router).unwrap().id.clone();
        cart.update_quantity(&line_id, 2).unwrap();
        cart.add_item(ItemKind::Service, &CatalogItem::fixed("s1", "Setup", Money::from_minor(1000)))
            .unwrap();
        cart.set_global_discount(Some(DiscountDescriptor::fixed(Money::from_minor(500))))
            .unwrap();
        NewOrder::from_cart(&cart, PaymentMethod::Cash, Some("Awa".into()), None).unwrap()
    }

    #[tokio::test]
    async fn test_create_numbers_orders_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        let first = repo.create(&sample_order(), day()).await.unwrap();
        let second = repo.create(&sample_order(), day()).await.unwrap();
        assert_eq!(first.order_number, "CMD-20240315-0001");
        assert_eq!(second.order_number, "CMD-20240315-0002");

        let next_day = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        let third = repo.create(&sample_order(), next_day).await.unwrap();
        assert_eq!(third.order_number, "CMD-20240316-0001");
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = sample_order();
        let created = db.orders().create(&order, day()).await.unwrap();

        let loaded = db.orders().get(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.total.minor(), 2 * 2500 + 1000 - 500);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0].name_snapshot, "Router");
        assert_eq!(loaded.items[0].quantity, 2);
        assert_eq!(loaded.customer_name.as_deref(), Some("Awa"));
        assert_eq!(loaded.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.orders().create(&sample_order(), day()).await.unwrap();
        let second = db.orders().create(&sample_order(), day()).await.unwrap();

        let orders = db.orders().list(10).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
        assert!(orders.iter().all(|o| o.items.len() == 2));

        assert_eq!(db.orders().list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_paid_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.orders().create(&sample_order(), day()).await.unwrap();

        let paid = db.orders().mark_paid(&created.id, "CAPTURE-1").await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.paid_at.is_some());

        // Same capture again is harmless, a different one is refused.
        assert!(db.orders().mark_paid(&created.id, "CAPTURE-1").await.is_ok());
        let err = db.orders().mark_paid(&created.id, "CAPTURE-2").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::OrderNotPending { .. })));

        let err = db.orders().mark_paid("missing", "CAPTURE-1").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
