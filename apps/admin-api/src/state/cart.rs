//! # Cart State
//!
//! The order being built on the dashboard. There is one admin session per
//! process, so there is one cart.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  Dashboard Action         Endpoint                    Cart Change       │
//! │  ────────────────         ────────                    ───────────       │
//! │                                                                         │
//! │  Pick product ──────────► POST /api/cart/items ─────► items.push(line) │
//! │                                                                         │
//! │  Change quantity ───────► PATCH /items/{id} ────────► line.qty = n     │
//! │                                                                         │
//! │  Line discount ─────────► PUT /items/{id}/discount ─► line re-priced   │
//! │                                                                         │
//! │  Order discount ────────► PUT /api/cart/discount ───► global discount  │
//! │                                                                         │
//! │  Submit order ──────────► POST /api/orders ─────────► snapshot, clear  │
//! │                                                                         │
//! │  NOTE: All write operations acquire the Mutex lock exclusively.         │
//! │        The lock is never held across an await.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use comptoir_core::Cart;

/// Shared cart behind `Arc<Mutex<_>>`.
#[derive(Debug, Clone)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    /// Creates a new empty cart state.
    pub fn new() -> Self {
        CartState {
            cart: Arc::new(Mutex::new(Cart::new())),
        }
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let totals = cart_state.with_cart(|cart| cart.totals());
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        // A panic mid-update leaves a cart that is still structurally valid.
        let cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// cart_state.with_cart_mut(|cart| cart.update_quantity(&id, 3))?;
    /// ```
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cart)
    }

    /// A copy of the current cart.
    pub fn snapshot(&self) -> Cart {
        self.with_cart(Cart::clone)
    }

    /// Empties the cart if it still equals `submitted`. Returns whether it did.
    pub fn clear_if_unchanged(&self, submitted: &Cart) -> bool {
        self.with_cart_mut(|cart| {
            let unchanged = cart == submitted;
            if unchanged {
                cart.clear();
            }
            unchanged
        })
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}
