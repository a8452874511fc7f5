//! Order submission and lookup.
//!
//! ```text
//! POST /api/orders
//!   cart snapshot ──► NewOrder::from_cart ──► orders + order_items (one tx)
//!                                                  │
//!                                                  ▼
//!                                cart cleared if still the snapshot
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use comptoir_core::validation::validate_uuid;
use comptoir_core::{NewOrder, Order, PaymentMethod};

use crate::error::{ApiError, ApiResult};
use crate::state::{business_today, AppState};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders).post(submit_order))
        .route("/api/orders/{id}", get(get_order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// Persists the cart as an order and empties the cart, unless it was
/// edited while the order was being written.
pub async fn submit_order(
    State(state): State<AppState>,
    Json(body): Json<SubmitOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let submitted = state.cart.snapshot();
    let new_order = NewOrder::from_cart(&submitted, body.payment_method, body.customer_name, body.notes)?;

    let order = state.db.orders().create(&new_order, business_today()).await?;
    if !state.cart.clear_if_unchanged(&submitted) {
        warn!(order_number = %order.order_number, "Cart edited during submit, left as is");
    }

    info!(
        order_number = %order.order_number,
        total = %order.total,
        method = ?order.payment_method,
        "Order submitted"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// Most recent first.
pub async fn list_orders(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<Order>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(Json(state.db.orders().list(limit).await?))
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    validate_uuid(&id)?;
    state
        .db
        .orders()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order", &id))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, post, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    fn product(id: &str, price: i64) -> serde_json::Value {
        json!({
            "kind": "product",
            "catalogItem": {"id": id, "name": format!("Produit {id}"), "pricing": {"type": "fixed", "price": price}}
        })
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_be_submitted() {
        let (app, _) = test_app().await;
        let (status, body) = post(&app, "/api/orders", json!({"paymentMethod": "cash"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_submit_snapshots_and_clears_cart() {
        let (app, _) = test_app().await;
        post(&app, "/api/cart/items", product("p1", 1500)).await;
        post(&app, "/api/cart/items", product("p2", 2500)).await;

        let (status, order) = post(
            &app,
            "/api/orders",
            json!({"paymentMethod": "cash", "customerName": "  Awa  ", "notes": ""}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(order["orderNumber"].as_str().unwrap().starts_with("CMD-"));
        assert!(order["orderNumber"].as_str().unwrap().ends_with("-0001"));
        assert_eq!(order["status"], "pending");
        assert_eq!(order["total"], 4000);
        assert_eq!(order["customerName"], "Awa");
        assert!(order["notes"].is_null());
        assert_eq!(order["items"].as_array().unwrap().len(), 2);

        let (_, cart) = get(&app, "/api/cart").await;
        assert_eq!(cart["items"].as_array().unwrap().len(), 0);

        let id = order["id"].as_str().unwrap();
        let (status, fetched) = get(&app, &format!("/api/orders/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["orderNumber"], order["orderNumber"]);

        let (_, list) = get(&app, "/api/orders").await;
        assert_eq!(list[0]["id"], order["id"]);
    }

    #[tokio::test]
    async fn test_get_order_errors() {
        let (app, _) = test_app().await;
        let (status, _) = get(&app, "/api/orders/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&app, "/api/orders/6f1c2a9e-6b1f-4f25-9a55-0d1f5b0f6a11").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
