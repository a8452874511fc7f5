//! # Cart Aggregator
//!
//! The order being built on the "new order" screen.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Dashboard Action        Cart method               Recomputed           │
//! │  ────────────────        ───────────               ──────────           │
//! │                                                                         │
//! │  Pick product ─────────► add_item() ─────────────► line totals          │
//! │  Change quantity ──────► update_quantity() ──────► line + order totals  │
//! │  Line discount ────────► set_item_discount() ────► line + order totals  │
//! │  Order discount ───────► set_global_discount() ──► order totals         │
//! │  Delivery ─────────────► set_delivery_cost() ────► order totals         │
//! │  Remove ───────────────► remove_item() ──────────► order totals         │
//! │                                                                         │
//! │  Every method recomputes before returning: totals() is always current. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `line.total_price = max(0, unit_price × quantity - discount_amount)`
//! - `order_total = max(0, items_subtotal - global_discount_amount + delivery_cost)`
//! - At most [`MAX_CART_ITEMS`] lines and [`MAX_ITEM_QUANTITY`] per line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::discount::{self, DiscountDescriptor};
use crate::error::{CoreError, CoreResult};
use crate::import::ImportEstimate;
use crate::money::Money;
use crate::types::{CatalogItem, ItemKind};
use crate::validation::{validate_discount, validate_name, validate_price};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Line Item
// =============================================================================

/// One line of the cart.
///
/// Name and unit price are frozen when the line is created; later catalog
/// edits do not reach a cart in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub kind: ItemKind,
    /// Catalog reference, `None` for lines synthesized from an import estimate.
    pub catalog_id: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Option<DiscountDescriptor>,
    pub discount_amount: Money,
    pub total_price: Money,
}

impl LineItem {
    /// New line at quantity 1 with no discount.
    pub fn new(kind: ItemKind, catalog_id: Option<String>, name: impl Into<String>, unit_price: Money) -> Self {
        let mut line = LineItem {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            catalog_id,
            name: name.into(),
            unit_price,
            quantity: 1,
            discount: None,
            discount_amount: Money::zero(),
            total_price: Money::zero(),
        };
        line.recompute();
        line
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    fn recompute(&mut self) {
        self.discount_amount =
            discount::item_discount_amount(self.unit_price, self.quantity, self.discount.as_ref());
        self.total_price = discount::item_total(self.unit_price, self.quantity, self.discount.as_ref());
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Ordered lines plus order-level discount and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<LineItem>,
    pub global_discount: Option<DiscountDescriptor>,
    pub delivery_cost: Money,
    /// When the cart was created or last cleared.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            global_discount: None,
            delivery_cost: Money::zero(),
            created_at: Utc::now(),
        }
    }

    fn line_mut(&mut self, item_id: &str) -> CoreResult<&mut LineItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CoreError::LineItemNotFound(item_id.to_string()))
    }

    pub fn line(&self, item_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Appends a line for a catalog item at quantity 1.
    ///
    /// Range-priced services start at their minimum price. Quote-only items
    /// are refused with [`CoreError::QuoteRequired`] so the caller can send
    /// the operator to the quote form instead.
    pub fn add_item(&mut self, kind: ItemKind, item: &CatalogItem) -> CoreResult<&LineItem> {
        let price = item
            .pricing
            .cart_price()
            .ok_or_else(|| CoreError::QuoteRequired {
                catalog_id: item.id.clone(),
                name: item.name.clone(),
            })?;
        validate_name("name", &item.name)?;
        validate_price("price", price)?;
        self.push_line(LineItem::new(kind, Some(item.id.clone()), item.name.trim(), price))
    }

    /// Appends a line synthesized from an import estimate.
    ///
    /// A physical import (weight > 0) is a PRODUCT, anything else a SERVICE.
    pub fn add_import_item(&mut self, name: &str, estimate: &ImportEstimate, weight_kg: f64) -> CoreResult<&LineItem> {
        validate_name("name", name)?;
        validate_price("suggestedPrice", estimate.suggested_price)?;
        self.push_line(estimate.to_line_item(name.trim(), weight_kg))
    }

    fn push_line(&mut self, line: LineItem) -> CoreResult<&LineItem> {
        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }
        self.items.push(line);
        Ok(&self.items[self.items.len() - 1])
    }

    /// Sets a line's quantity. Zero or less removes the line.
    pub fn update_quantity(&mut self, item_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove_item(item_id);
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        let line = self.line_mut(item_id)?;
        line.quantity = quantity;
        line.recompute();
        Ok(())
    }

    /// Replaces a line's discount (`None` clears it).
    pub fn set_item_discount(&mut self, item_id: &str, discount: Option<DiscountDescriptor>) -> CoreResult<()> {
        if let Some(d) = &discount {
            validate_discount(d)?;
        }
        let line = self.line_mut(item_id)?;
        line.discount = discount.filter(|d| !d.is_noop());
        line.recompute();
        Ok(())
    }

    /// Replaces the order-level discount (`None` clears it).
    pub fn set_global_discount(&mut self, discount: Option<DiscountDescriptor>) -> CoreResult<()> {
        if let Some(d) = &discount {
            validate_discount(d)?;
        }
        self.global_discount = discount.filter(|d| !d.is_noop());
        Ok(())
    }

    pub fn set_delivery_cost(&mut self, cost: Money) -> CoreResult<()> {
        validate_price("deliveryCost", cost)?;
        self.delivery_cost = cost;
        Ok(())
    }

    /// Deletes a line. Other lines keep their discounts.
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<()> {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before {
            return Err(CoreError::LineItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    /// Empties the cart, including discount and delivery.
    pub fn clear(&mut self) {
        *self = Cart::new();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items_subtotal(&self) -> Money {
        self.items.iter().map(|i| i.total_price).sum()
    }

    pub fn global_discount_amount(&self) -> Money {
        let subtotal = self.items_subtotal();
        self.global_discount
            .map(|d| d.amount_for(subtotal))
            .unwrap_or_else(Money::zero)
    }

    pub fn order_total(&self) -> Money {
        (self.items_subtotal() - self.global_discount_amount() + self.delivery_cost).clamp_non_negative()
    }

    /// All derived figures at once.
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.items.len(),
            total_quantity: self.items.iter().map(|i| i.quantity).sum(),
            items_subtotal: self.items_subtotal(),
            global_discount_amount: self.global_discount_amount(),
            delivery_cost: self.delivery_cost,
            order_total: self.order_total(),
        }
    }
}

/// Cart totals summary for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub items_subtotal: Money,
    pub global_discount_amount: Money,
    pub delivery_cost: Money,
    pub order_total: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportEstimate;
    use crate::types::Pricing;

    fn product(id: &str, price: i64) -> CatalogItem {
        CatalogItem::fixed(id, format!("Produit {id}"), Money::from_minor(price))
    }

    fn add(cart: &mut Cart, id: &str, price: i64) -> String {
        cart.add_item(ItemKind::Product, &product(id, price))
            .unwrap()
            .id
            .clone()
    }

    #[test]
    fn test_add_item_starts_at_quantity_one() {
        let mut cart = Cart::new();
        let line = cart
            .add_item(ItemKind::Product, &product("p1", 1000))
            .unwrap()
            .clone();
        assert_eq!(line.quantity, 1);
        assert_eq!(line.total_price.minor(), 1000);
        assert_eq!(line.catalog_id.as_deref(), Some("p1"));
        assert!(line.discount.is_none());
    }

    #[test]
    fn test_range_priced_service_uses_min_price() {
        let mut cart = Cart::new();
        let service = CatalogItem {
            id: "s1".to_string(),
            name: "Installation".to_string(),
            pricing: Pricing::Range {
                min_price: Money::from_minor(2000),
                max_price: Money::from_minor(9000),
            },
        };
        let line = cart.add_item(ItemKind::Service, &service).unwrap();
        assert_eq!(line.unit_price.minor(), 2000);
        assert_eq!(line.kind, ItemKind::Service);
    }

    #[test]
    fn test_quote_item_is_refused() {
        let mut cart = Cart::new();
        let item = CatalogItem {
            id: "q1".to_string(),
            name: "Câblage bureau".to_string(),
            pricing: Pricing::Quote,
        };
        let err = cart.add_item(ItemKind::Service, &item).unwrap_err();
        assert!(matches!(err, CoreError::QuoteRequired { ref catalog_id, .. } if catalog_id == "q1"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_line_discount_scenario() {
        let mut cart = Cart::new();
        let id = add(&mut cart, "p1", 1000);
        cart.update_quantity(&id, 2).unwrap();
        cart.set_item_discount(&id, Some(DiscountDescriptor::percentage(10.0)))
            .unwrap();

        let line = cart.line(&id).unwrap();
        assert_eq!(line.discount_amount.minor(), 200);
        assert_eq!(line.total_price.minor(), 1800);
        assert_eq!(cart.order_total().minor(), 1800);
    }

    #[test]
    fn test_fixed_global_discount_is_capped() {
        let mut cart = Cart::new();
        add(&mut cart, "p1", 3000);
        add(&mut cart, "p2", 2000);
        cart.set_global_discount(Some(DiscountDescriptor::fixed(Money::from_minor(6000))))
            .unwrap();

        assert_eq!(cart.items_subtotal().minor(), 5000);
        assert_eq!(cart.global_discount_amount().minor(), 5000);
        assert_eq!(cart.order_total(), Money::zero());

        cart.set_delivery_cost(Money::from_minor(700)).unwrap();
        assert_eq!(cart.order_total().minor(), 700);
    }

    #[test]
    fn test_global_percentage_follows_quantity_changes() {
        let mut cart = Cart::new();
        let id = add(&mut cart, "p1", 1000);
        cart.set_global_discount(Some(DiscountDescriptor::percentage(10.0)))
            .unwrap();
        assert_eq!(cart.order_total().minor(), 900);

        cart.update_quantity(&id, 3).unwrap();
        assert_eq!(cart.global_discount_amount().minor(), 300);
        assert_eq!(cart.order_total().minor(), 2700);
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = Cart::new();
        let keep = add(&mut cart, "p1", 1000);
        let drop = add(&mut cart, "p2", 500);
        cart.set_item_discount(&keep, Some(DiscountDescriptor::fixed(Money::from_minor(100))))
            .unwrap();

        cart.update_quantity(&drop, 0).unwrap();
        assert_eq!(cart.items.len(), 1);
        // Removing a line leaves the others' discounts alone.
        assert_eq!(cart.line(&keep).unwrap().total_price.minor(), 900);

        assert!(matches!(
            cart.remove_item(&drop),
            Err(CoreError::LineItemNotFound(_))
        ));
    }

    #[test]
    fn test_limits() {
        let mut cart = Cart::new();
        let id = add(&mut cart, "p0", 100);
        assert!(matches!(
            cart.update_quantity(&id, MAX_ITEM_QUANTITY + 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        for n in 1..MAX_CART_ITEMS {
            add(&mut cart, &format!("p{n}"), 100);
        }
        assert!(matches!(
            cart.add_item(ItemKind::Product, &product("extra", 100)),
            Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS })
        ));
    }

    #[test]
    fn test_invalid_inputs_leave_state_unchanged() {
        let mut cart = Cart::new();
        let id = add(&mut cart, "p1", 1000);
        assert!(cart
            .set_item_discount(&id, Some(DiscountDescriptor::percentage_bps(12_000)))
            .is_err());
        assert!(cart.set_delivery_cost(Money::from_minor(-1)).is_err());
        assert_eq!(cart.order_total().minor(), 1000);
    }

    #[test]
    fn test_totals_are_pure() {
        let mut cart = Cart::new();
        let id = add(&mut cart, "p1", 1250);
        add(&mut cart, "p2", 990);
        cart.update_quantity(&id, 4).unwrap();
        cart.set_global_discount(Some(DiscountDescriptor::percentage(12.5)))
            .unwrap();
        cart.set_delivery_cost(Money::from_minor(1500)).unwrap();

        let first = cart.totals();
        let second = cart.totals();
        assert_eq!(first, second);
        assert_eq!(first.item_count, 2);
        assert_eq!(first.total_quantity, 5);
        assert_eq!(first.items_subtotal.minor(), 5990);
        // 12.5% of 5990 = 748.75 → 749
        assert_eq!(first.global_discount_amount.minor(), 749);
        assert_eq!(first.order_total.minor(), 5990 - 749 + 1500);
    }

    #[test]
    fn test_import_item_kind_follows_weight() {
        let estimate = ImportEstimate {
            transport_cost: Money::from_minor(1000),
            customs_duty: Money::from_minor(500),
            vat: Money::from_minor(300),
            handling_fee: Money::from_minor(200),
            total_cost_local: Money::from_minor(6000),
            suggested_price: Money::from_minor(7800),
            margin_percent: 30.0,
            transit_time: "5-7 jours".to_string(),
        };
        let mut cart = Cart::new();
        let line = cart.add_import_item("Imprimante", &estimate, 4.2).unwrap();
        assert_eq!(line.kind, ItemKind::Product);
        assert_eq!(line.unit_price.minor(), 7800);
        assert!(line.catalog_id.is_none());

        let line = cart.add_import_item("Licence logiciel", &estimate, 0.0).unwrap();
        assert_eq!(line.kind, ItemKind::Service);
    }

    #[test]
    fn test_import_item_with_negative_price_refused() {
        let estimate = ImportEstimate {
            transport_cost: Money::zero(),
            customs_duty: Money::zero(),
            vat: Money::zero(),
            handling_fee: Money::zero(),
            total_cost_local: Money::zero(),
            suggested_price: Money::from_minor(-5000),
            margin_percent: 0.0,
            transit_time: String::new(),
        };
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add_import_item("Imprimante", &estimate, 1.0),
            Err(CoreError::Validation(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cart = Cart::new();
        add(&mut cart, "p1", 1000);
        cart.set_delivery_cost(Money::from_minor(500)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.totals().order_total, Money::zero());
        assert!(cart.global_discount.is_none());
    }
}
