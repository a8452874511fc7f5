//! # comptoir-core: Pure Business Rules for Comptoir
//!
//! Every rule the back office applies to money and tickets, as pure
//! functions and owned values. No database, no network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Admin dashboard (browser)                    │   │
//! │  │    New order ──► Tickets ──► Daily report ──► Checkout          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    admin-api (axum)                             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ comptoir-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ discount │ │   cart   │ │  ledger  │ │  report  │          │   │
//! │  │   │  money   │ │  order   │ │   code   │ │          │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐                       │   │
//! │  │   │  import  │ │ payment  │ │validation│                       │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  comptoir-db (SQLite)                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money and basis-point percentages
//! - [`discount`] - Per-line and order-level discount math
//! - [`cart`] - The order being built, with its totals
//! - [`order`] - Submitted order snapshots
//! - [`ledger`] - Ticket history, transitions, day summary
//! - [`code`] - Ticket code resolution and generation
//! - [`report`] - Daily report rollup
//! - [`import`] - Import-cost estimator contract
//! - [`payment`] - Payment provider contract
//! - [`validation`] - Boundary checks
//!
//! ## Example Usage
//!
//! ```rust
//! use comptoir_core::{Cart, CatalogItem, DiscountDescriptor, ItemKind, Money};
//!
//! let mut cart = Cart::new();
//! let line_id = cart
//!     .add_item(ItemKind::Product, &CatalogItem::fixed("p1", "Câble HDMI", Money::from_minor(1000)))
//!     .unwrap()
//!     .id
//!     .clone();
//! cart.update_quantity(&line_id, 2).unwrap();
//! cart.set_item_discount(&line_id, Some(DiscountDescriptor::percentage(10.0))).unwrap();
//!
//! assert_eq!(cart.totals().order_total.minor(), 1800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod code;
pub mod discount;
pub mod error;
pub mod import;
pub mod ledger;
pub mod money;
pub mod order;
pub mod payment;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartTotals, LineItem};
pub use discount::{DiscountDescriptor, DiscountKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{BrokenReason, DaySummary, EntryKind, HistoryEntry, LedgerEntry, TicketLedger};
pub use money::Money;
pub use order::{NewOrder, Order, OrderItem, OrderStatus, PaymentMethod};
pub use report::{DailyReport, MonthSummary, ReportDraft, TicketUsage};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single cart line.
///
/// Catches typos (1000 instead of 10) before they reach an order.
pub const MAX_ITEM_QUANTITY: i64 = 999;
