//! # Domain Types
//!
//! Catalog and stock types shared by the cart, the ledger and the reports.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CatalogItem   │   │   TicketType    │   │   StockUpdate   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  ticket_id (FK) │       │
//! │  │  kind           │   │  duration       │   │  amount         │       │
//! │  │  name           │   │  price          │   │  previous_stock │       │
//! │  │  pricing        │   │  stock (>= 0)   │   │  new_stock      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    ItemKind     │   │    Pricing      │                             │
//! │  │  Product        │   │  Fixed          │                             │
//! │  │  Service        │   │  Range          │                             │
//! │  │  Offer          │   │  Quote          │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ledger rows live in [`crate::ledger`], orders in [`crate::order`] and
//! reports in [`crate::report`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Item Kind
// =============================================================================

/// What a cart line refers to in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    Service,
    Offer,
}

// =============================================================================
// Catalog Item
// =============================================================================

/// How a catalog item is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pricing {
    /// One price.
    Fixed { price: Money },
    /// Range-priced service; the cart starts at `min_price`.
    Range {
        #[serde(rename = "minPrice")]
        min_price: Money,
        #[serde(rename = "maxPrice")]
        max_price: Money,
    },
    /// Priced on quotation only. Cannot be added to a cart.
    Quote,
}

impl Pricing {
    /// Unit price used when the item lands in the cart, `None` for quotes.
    pub fn cart_price(&self) -> Option<Money> {
        match self {
            Pricing::Fixed { price } => Some(*price),
            Pricing::Range { min_price, .. } => Some(*min_price),
            Pricing::Quote => None,
        }
    }
}

/// A product, service or offer as the catalog screens hand it to the cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub pricing: Pricing,
}

impl CatalogItem {
    pub fn fixed(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        CatalogItem {
            id: id.into(),
            name: name.into(),
            pricing: Pricing::Fixed { price },
        }
    }
}

// =============================================================================
// Ticket Type
// =============================================================================

/// A stock-keeping unit for a consumable ticket (e.g. a 1h WiFi ticket).
///
/// Only the persisted stock lives here. Today's used and broken counts are a
/// fold over the day's history, see [`crate::ledger::DaySummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: String,
    /// Label shown on the dashboard ("1h", "3h", "24h").
    pub duration: String,
    pub price: Money,
    /// Never negative.
    pub stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    /// A new ticket type with empty stock.
    pub fn new(duration: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        TicketType {
            id: uuid::Uuid::new_v4().to_string(),
            duration: duration.into(),
            price,
            stock: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

// =============================================================================
// Stock Update
// =============================================================================

/// Where a replenishment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    /// Operator typed an amount.
    Manual,
    /// Codes were imported into the pool.
    Import,
}

/// Append-only log row for one replenishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub id: String,
    pub ticket_id: String,
    pub amount: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub source: StockSource,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockUpdate {
    /// Records `amount` being added on top of `previous_stock`.
    pub fn record(ticket_id: &str, previous_stock: i64, amount: i64, source: StockSource) -> Self {
        StockUpdate {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            amount,
            previous_stock,
            new_stock: previous_stock + amount,
            source,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_price_by_pricing() {
        let fixed = Pricing::Fixed {
            price: Money::from_minor(1500),
        };
        assert_eq!(fixed.cart_price(), Some(Money::from_minor(1500)));

        let range = Pricing::Range {
            min_price: Money::from_minor(2000),
            max_price: Money::from_minor(8000),
        };
        assert_eq!(range.cart_price(), Some(Money::from_minor(2000)));

        assert_eq!(Pricing::Quote.cart_price(), None);
    }

    #[test]
    fn test_pricing_json_shape() {
        let range: Pricing =
            serde_json::from_str(r#"{"type":"range","minPrice":2000,"maxPrice":8000}"#).unwrap();
        assert_eq!(range.cart_price(), Some(Money::from_minor(2000)));

        let quote: Pricing = serde_json::from_str(r#"{"type":"quote"}"#).unwrap();
        assert_eq!(quote, Pricing::Quote);
    }

    #[test]
    fn test_new_ticket_type_starts_empty() {
        let t = TicketType::new("1h", Money::from_minor(500));
        assert_eq!(t.stock, 0);
        assert!(!t.in_stock());
    }

    #[test]
    fn test_stock_update_record() {
        let update = StockUpdate::record("t1", 3, 10, StockSource::Manual);
        assert_eq!(update.previous_stock, 3);
        assert_eq!(update.new_stock, 13);
        assert_eq!(update.amount, 10);
    }
}
