//! Online payment: configuration check, then create and capture.
//!
//! ```text
//! dashboard                admin-api                     provider
//!    │ GET config ────────► client id or message
//!    │ POST orders ───────► validate ──► create_order ──────► id
//!    │   (buyer approves in the widget)
//!    │ POST capture ──────► validate ──► capture_order ─────► COMPLETED
//!    │                                     │
//!    │                     orderData.orderId? ──► orders.mark_paid
//! ```

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info};

use comptoir_core::payment::{
    CaptureOrderRequest, CaptureOrderResponse, CreateOrderRequest, CreateOrderResponse, PaymentConfigStatus,
};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/config", get(payment_config))
        .route("/api/payments/orders", post(create_order))
        .route("/api/payments/capture", post(capture_order))
}

/// Never fails: an unconfigured provider is reported in the body.
pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigStatus> {
    Json(state.config.payment_config().status())
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    body.validate()?;
    let provider = state.paypal()?;
    let created = provider.create_order(&body).await?;
    info!(provider_order = %created.id, amount = %body.amount, "Checkout order created");
    Ok(Json(created))
}

/// Captures an approved checkout order and marks the local order paid.
pub async fn capture_order(
    State(state): State<AppState>,
    Json(body): Json<CaptureOrderRequest>,
) -> ApiResult<Json<CaptureOrderResponse>> {
    body.validate()?;
    let provider = state.paypal()?;
    let captured = provider.capture_order(body.order_id.trim()).await?;

    if let (true, Some(order_id)) = (captured.is_completed(), body.internal_order_id()) {
        if let Err(e) = state.db.orders().mark_paid(order_id, &captured.id).await {
            // The money is taken at this point; the capture id is what reconciles it.
            error!(order_id, capture = %captured.id, error = %e, "Captured payment could not be recorded");
            return Err(e.into());
        }
    }

    info!(capture = %captured.id, status = %captured.status, "Checkout order captured");
    Ok(Json(captured))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use crate::config::AdminConfig;
    use crate::routes::test_support::{get, post, test_app, test_app_with};
    use crate::services::paypal::testing::fake_provider;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let (app, _) = test_app().await;

        let (status, body) = get(&app, "/api/payments/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], false);
        assert!(body["message"].as_str().unwrap().contains("PAYPAL_CLIENT_ID"));
        assert!(body.get("clientId").is_none());

        let (status, body) = post(&app, "/api/payments/orders", json!({"amount": 2500})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected() {
        let (app, _) = test_app().await;
        let (status, body) = post(&app, "/api/payments/orders", json!({"amount": 0})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = post(&app, "/api/payments/capture", json!({"orderID": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(&app, "/api/payments/capture", json!({"orderID": "../../v1/identity"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_capture_marks_order_paid() {
        let base = fake_provider(Arc::new(AtomicU32::new(0))).await;
        let mut config = AdminConfig::default();
        config.payment.client_id = Some("client-id".to_string());
        config.payment.client_secret = Some("secret".to_string());
        config.payment.api_base = base;
        let (app, _) = test_app_with(config).await;

        let (_, status) = get(&app, "/api/payments/config").await;
        assert_eq!(status["configured"], true);
        assert_eq!(status["clientId"], "client-id");
        assert_eq!(status["currency"], "EUR");

        post(
            &app,
            "/api/cart/items",
            json!({
                "kind": "product",
                "catalogItem": {"id": "p1", "name": "Routeur", "pricing": {"type": "fixed", "price": 2500}}
            }),
        )
        .await;
        let (_, order) = post(&app, "/api/orders", json!({"paymentMethod": "paypal"})).await;
        let order_id = order["id"].as_str().unwrap().to_string();

        let (status, created) = post(
            &app,
            "/api/payments/orders",
            json!({"amount": 2500, "orderData": {"orderId": order_id}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], "PP-2500");

        let (status, captured) = post(
            &app,
            "/api/payments/capture",
            json!({"orderID": "PP-2500", "orderData": {"orderId": order_id}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(captured["status"], "COMPLETED");

        let (_, paid) = get(&app, &format!("/api/orders/{order_id}")).await;
        assert_eq!(paid["status"], "paid");
        assert_eq!(paid["paymentReference"], "PP-2500");

        // Replaying the same capture is harmless.
        let (status, _) = post(
            &app,
            "/api/payments/capture",
            json!({"orderID": "PP-2500", "orderData": {"orderId": order_id}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
