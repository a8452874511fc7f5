//! # Orders
//!
//! The snapshot written when a cart is submitted.
//!
//! ## Snapshot Pattern
//! Every figure is copied out of the cart at submission. An order never
//! points back at the cart or at live catalog prices, so it reads the same
//! whatever happens to the catalog afterwards.
//!
//! ```text
//! Cart ──submit──► NewOrder ──persist──► Order (pending)
//!                                          │
//!                            capture ok ───┴──► Order (paid, payment_reference)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ItemKind;
use crate::validation::ValidationResult;

// =============================================================================
// Status & Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Submitted, waiting for payment.
    #[default]
    Pending,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Wallet checkout through the payment provider.
    Paypal,
    /// Card checkout through the payment provider.
    Card,
}

impl PaymentMethod {
    /// Whether payment goes through the external provider.
    pub const fn uses_provider(&self) -> bool {
        matches!(self, PaymentMethod::Paypal | PaymentMethod::Card)
    }
}

// =============================================================================
// Order
// =============================================================================

/// One frozen cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub kind: ItemKind,
    pub catalog_id: Option<String>,
    pub name_snapshot: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount_amount: Money,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// `CMD-YYYYMMDD-NNNN`.
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub global_discount: Money,
    pub delivery_cost: Money,
    pub total: Money,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    /// Provider capture id once paid.
    pub payment_reference: Option<String>,
    pub items: Vec<OrderItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// An order ready to be persisted. The number is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: String,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub global_discount: Money,
    pub delivery_cost: Money,
    pub total: Money,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl NewOrder {
    /// Freezes the cart. An empty cart cannot be submitted.
    pub fn from_cart(
        cart: &Cart,
        payment_method: PaymentMethod,
        customer_name: Option<String>,
        notes: Option<String>,
    ) -> ValidationResult<Self> {
        if cart.is_empty() {
            return Err(ValidationError::required("items"));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let totals = cart.totals();
        let items = cart
            .items
            .iter()
            .map(|line| OrderItem {
                id: uuid::Uuid::new_v4().to_string(),
                order_id: id.clone(),
                kind: line.kind,
                catalog_id: line.catalog_id.clone(),
                name_snapshot: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                discount_amount: line.discount_amount,
                total_price: line.total_price,
            })
            .collect();

        Ok(NewOrder {
            id,
            payment_method,
            subtotal: totals.items_subtotal,
            global_discount: totals.global_discount_amount,
            delivery_cost: totals.delivery_cost,
            total: totals.order_total,
            customer_name: trimmed(customer_name),
            notes: trimmed(notes),
            items,
        })
    }
}

/// Formats an order number from the day and that day's sequence.
///
/// ```rust
/// use chrono::NaiveDate;
/// use comptoir_core::order::order_number;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// assert_eq!(order_number(day, 7), "CMD-20240315-0007");
/// ```
pub fn order_number(date: NaiveDate, sequence: i64) -> String {
    format!("CMD-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Prefix shared by every order number of `date`, for sequence lookups.
pub fn order_number_prefix(date: NaiveDate) -> String {
    format!("CMD-{}-", date.format("%Y%m%d"))
}
