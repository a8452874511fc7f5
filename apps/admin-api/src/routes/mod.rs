//! HTTP route handlers for the admin dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness and integration status
//!
//! # Tickets
//! GET    /api/tickets                         - Ticket types with stock
//! POST   /api/tickets                         - Create a ticket type
//! POST   /api/tickets/{id}/stock              - Manual replenishment
//! POST   /api/tickets/{id}/codes              - Import codes into the pool
//! POST   /api/tickets/{id}/use                - Issue one ticket
//! POST   /api/tickets/{id}/broken             - Record a breakage
//! GET    /api/tickets/{id}/stock-updates      - Replenishment log
//!
//! # Daily history
//! GET    /api/history?date=YYYY-MM-DD         - Rows and summary of a day
//! POST   /api/history                         - Generic append
//! DELETE /api/history/{id}                    - Delete an unsettled row
//! POST   /api/history/{id}/report-broken      - USED → BROKEN
//! POST   /api/history/{id}/cancel-broken      - BROKEN → USED
//! POST   /api/history/{id}/return-to-stock    - Undo a use
//!
//! # Reports
//! POST   /api/reports                         - Save the day's report
//! GET    /api/reports?month=YYYY-MM           - Month listing
//!
//! # Cart and orders
//! GET    /api/cart, DELETE /api/cart
//! POST   /api/cart/items, PATCH|DELETE /api/cart/items/{id}
//! PUT    /api/cart/items/{id}/discount, /api/cart/discount, /api/cart/delivery
//! POST   /api/cart/import-item
//! POST   /api/import/estimate
//! POST   /api/orders, GET /api/orders, GET /api/orders/{id}
//!
//! # Payments
//! GET    /api/payments/config
//! POST   /api/payments/orders
//! POST   /api/payments/capture
//! ```

pub mod cart;
pub mod health;
pub mod history;
pub mod import;
pub mod orders;
pub mod payments;
pub mod reports;
pub mod tickets;

use axum::Router;

use crate::state::AppState;

/// Every route, without state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(tickets::router())
        .merge(history::router())
        .merge(reports::router())
        .merge(cart::router())
        .merge(import::router())
        .merge(orders::router())
        .merge(payments::router())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use comptoir_db::{Database, DbConfig};

    use crate::config::AdminConfig;
    use crate::state::AppState;

    /// Router over an in-memory database with no integrations configured.
    pub async fn test_app() -> (Router, AppState) {
        test_app_with(AdminConfig::default()).await
    }

    pub async fn test_app_with(config: AdminConfig) -> (Router, AppState) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, config).unwrap();
        (crate::build_router(state.clone()), state)
    }

    /// Sends one request and returns the status and JSON body.
    pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, None).await
    }

    pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, uri, Some(body)).await
    }

    /// Creates a ticket type and gives it `stock` units. Returns its id.
    pub async fn ticket_with_stock(app: &Router, duration: &str, price: i64, stock: i64) -> String {
        let (status, ticket) = post(app, "/api/tickets", serde_json::json!({"duration": duration, "price": price})).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = ticket["id"].as_str().unwrap().to_string();
        if stock > 0 {
            let (status, _) = post(app, &format!("/api/tickets/{id}/stock"), serde_json::json!({"amount": stock})).await;
            assert_eq!(status, StatusCode::OK);
        }
        id
    }
}
