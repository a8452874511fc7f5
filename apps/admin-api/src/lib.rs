//! # Comptoir Admin API
//!
//! HTTP backend of the shop dashboard: ticket stock and daily history,
//! reports, the cart and orders, and the two outbound integrations.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Admin API (axum)                               │
//! │                                                                         │
//! │  dashboard ──► TraceLayer ──► routes ──┬──► comptoir-db ──► SQLite      │
//! │                                        │                                │
//! │                                        ├──► CartState (in memory)       │
//! │                                        │                                │
//! │                                        ├──► PayPalClient ──► provider   │
//! │                                        └──► ImportCostClient ──► estimator
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Domain rules live in `comptoir-core`; this crate only translates HTTP to
//! those calls and their errors back to status codes.

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::AdminConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// The full application with its middleware.
pub fn build_router(state: AppState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
