//! # Repository Module
//!
//! Database repository implementations for Comptoir.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.history().report_used_as_broken(id, reason)                │
//! │       ▼                                                                 │
//! │  HistoryRepository                                                     │
//! │  ├── fetch the row (inside a transaction)                              │
//! │  ├── ask comptoir-core for the transition                              │
//! │  └── delete old row + insert successor, commit                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules live in comptoir-core. Repositories only load, guard and store.
//!
//! ## Available Repositories
//!
//! - [`TicketRepository`](tickets::TicketRepository) - Ticket types, stock, code pool
//! - [`HistoryRepository`](history::HistoryRepository) - Daily history and reclassifications
//! - [`ReportRepository`](reports::ReportRepository) - Daily reports and settlement
//! - [`OrderRepository`](orders::OrderRepository) - Order snapshots

pub mod history;
pub mod orders;
pub mod reports;
pub mod tickets;

mod rows;
