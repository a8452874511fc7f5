//! # Discount Calculator
//!
//! Pure functions turning a price, a quantity and an optional discount into
//! a discount amount and a total.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = unit_price × quantity                                       │
//! │                                                                         │
//! │  PERCENTAGE (bps)  amount = subtotal × bps / 10000                      │
//! │  FIXED             amount = min(value, subtotal)                        │
//! │  NONE / value ≤ 0  amount = 0                                           │
//! │                                                                         │
//! │  total = max(0, subtotal - amount)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in here fails. Negative prices and quantities are rejected by
//! [`crate::validation`] before they get this far.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, FULL_BPS};

// =============================================================================
// Discount Descriptor
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is in basis points (1000 = 10%).
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
    None,
}

/// A discount attached to a line item or to the whole cart.
///
/// ```json
/// { "kind": "percentage", "value": 1000 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountDescriptor {
    pub kind: DiscountKind,
    pub value: i64,
}

impl DiscountDescriptor {
    /// Percentage discount from a human percentage (`10.0` = 10%).
    pub fn percentage(percent: f64) -> Self {
        DiscountDescriptor {
            kind: DiscountKind::Percentage,
            value: (percent * 100.0).round() as i64,
        }
    }

    /// Percentage discount already expressed in basis points.
    pub const fn percentage_bps(bps: i64) -> Self {
        DiscountDescriptor {
            kind: DiscountKind::Percentage,
            value: bps,
        }
    }

    /// Fixed discount in minor units.
    pub const fn fixed(amount: Money) -> Self {
        DiscountDescriptor {
            kind: DiscountKind::Fixed,
            value: amount.minor(),
        }
    }

    pub const fn none() -> Self {
        DiscountDescriptor {
            kind: DiscountKind::None,
            value: 0,
        }
    }

    /// True when applying this descriptor can never change a total.
    pub const fn is_noop(&self) -> bool {
        matches!(self.kind, DiscountKind::None) || self.value <= 0
    }

    /// Discount amount against `subtotal`.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        global_discount(subtotal, self.kind, self.value)
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Discount amount for the whole cart (or any subtotal).
///
/// The result is always within `0..=subtotal`.
pub fn global_discount(subtotal: Money, kind: DiscountKind, value: i64) -> Money {
    if value <= 0 || !subtotal.is_positive() {
        return Money::zero();
    }
    let amount = match kind {
        DiscountKind::Percentage => subtotal.percentage(value.min(FULL_BPS)),
        DiscountKind::Fixed => Money::from_minor(value),
        DiscountKind::None => Money::zero(),
    };
    amount.min(subtotal)
}

/// Discount amount for one line.
pub fn item_discount_amount(
    unit_price: Money,
    quantity: i64,
    discount: Option<&DiscountDescriptor>,
) -> Money {
    let subtotal = unit_price.multiply_quantity(quantity);
    discount
        .map(|d| d.amount_for(subtotal))
        .unwrap_or_else(Money::zero)
}

/// Total for one line once its discount is applied. Never negative.
pub fn item_total(unit_price: Money, quantity: i64, discount: Option<&DiscountDescriptor>) -> Money {
    let subtotal = unit_price.multiply_quantity(quantity);
    (subtotal - item_discount_amount(unit_price, quantity, discount)).clamp_non_negative()
}

// =============================================================================
// Unit Tests
// =============================================================================
