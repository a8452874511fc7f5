//! # Error Types
//!
//! Domain-specific error types for comptoir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comptoir-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  comptoir-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  admin-api errors (in app)                                             │
//! │  └── ApiError         - What the dashboard sees (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Dashboard    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arithmetic in this crate never fails. Errors here come from rules that
//! refuse a transition (no stock left, wrong entry kind, quote-only item).

use thiserror::Error;

use crate::ledger::EntryKind;
use crate::order::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ticket type cannot be found.
    #[error("Ticket type not found: {0}")]
    TicketNotFound(String),

    /// Attempted to use a ticket while stock is zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Click "Use ticket" (1h WiFi)
    ///      │
    ///      ▼
    /// stock == 0 ?
    ///      │
    ///      ▼
    /// OutOfStock { ticket_id: "t1" }
    ///      │
    ///      ▼
    /// Dashboard shows: "No 1h tickets left"
    /// ```
    #[error("Ticket type {ticket_id} is out of stock")]
    OutOfStock { ticket_id: String },

    /// Daily history entry cannot be found.
    #[error("History entry not found: {0}")]
    HistoryEntryNotFound(String),

    /// The history entry has the wrong kind for the requested move.
    ///
    /// ## When This Occurs
    /// - Reporting a BROKEN entry as broken again
    /// - Cancelling a breakage on a USED entry
    /// - Returning a BROKEN entry to stock
    #[error("History entry {entry_id} is {actual}, expected {expected}")]
    InvalidEntryKind {
        entry_id: String,
        expected: EntryKind,
        actual: EntryKind,
    },

    /// The history entry was already rolled into a saved daily report.
    #[error("History entry {0} belongs to a saved daily report")]
    EntrySettled(String),

    /// The catalog item is priced on quotation and cannot go into the cart.
    #[error("{name} is priced on quotation, request a quote instead")]
    QuoteRequired { catalog_id: String, name: String },

    /// Line item is not in the cart.
    #[error("Line item not in cart: {0}")]
    LineItemNotFound(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Payment was captured for an order that is no longer pending.
    #[error("Order {order_id} is {status:?}, it can no longer be paid")]
    OrderNotPending { order_id: String, status: OrderStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These block an action locally; nothing is written when one is returned.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for a missing field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for a non-positive value.
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
