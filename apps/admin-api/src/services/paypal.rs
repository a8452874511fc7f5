//! # Payment Provider Client
//!
//! Server-side half of the checkout widget: OAuth2 client credentials, then
//! create and capture checkout orders.
//!
//! ## Token and Readiness
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  access_token()                                                         │
//! │                                                                         │
//! │  cached and fresh? ──yes──► reuse                                      │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  POST /v1/oauth2/token (basic auth, client_credentials)                │
//! │        │                                                                │
//! │        ├── 200 ──────────────────► cache until expires_in - 60s        │
//! │        ├── 4xx ──────────────────► Rejected (bad credentials)          │
//! │        └── network / 5xx ──► sleep(interval), retry                    │
//! │                               while PollPolicy::allows(attempts)       │
//! │                               then Timeout { attempts }                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use comptoir_core::payment::{
    CaptureOrderResponse, CreateOrderRequest, CreateOrderResponse, PollPolicy,
};
use comptoir_core::Money;

use super::{ServiceError, ServiceResult};
use crate::config::AdminConfig;

const SERVICE: &str = "PayPal";

/// Tokens are refreshed this long before they actually expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Subset of the provider's order resource we read back.
#[derive(Debug, Deserialize)]
struct ProviderOrder {
    id: String,
    status: String,
}

struct Inner {
    http: Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    currency: String,
    decimals: u32,
    poll: PollPolicy,
    token: RwLock<Option<CachedToken>>,
}

/// Payment provider client. Cheap to clone.
#[derive(Clone)]
pub struct PayPalClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("api_base", &self.inner.api_base)
            .field("currency", &self.inner.currency)
            .finish_non_exhaustive()
    }
}

impl PayPalClient {
    /// Builds a client from the `[payment]` section.
    ///
    /// Returns `None` when the client id or secret is missing; the API then
    /// reports the provider as not configured.
    pub fn from_config(config: &AdminConfig) -> ServiceResult<Option<Self>> {
        let payment = &config.payment;
        let client_id = payment.client_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let secret = payment.client_secret.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (client_id, secret) {
            (Some(id), Some(secret)) => Self::new(
                &payment.api_base,
                id,
                secret,
                config.payment_currency(),
                config.currency.decimals,
                PollPolicy::default(),
            )
            .map(Some),
            (Some(_), None) => {
                warn!("PAYPAL_CLIENT_ID is set without a client secret, online payment disabled");
                Ok(None)
            }
            _ => {
                warn!("Payment provider not configured, online payment disabled");
                Ok(None)
            }
        }
    }

    pub fn new(
        api_base: &str,
        client_id: &str,
        client_secret: &str,
        currency: &str,
        decimals: u32,
        poll: PollPolicy,
    ) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::network(SERVICE, e))?;

        Ok(PayPalClient {
            inner: Arc::new(Inner {
                http,
                api_base: api_base.trim_end_matches('/').to_string(),
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                currency: currency.to_string(),
                decimals,
                poll,
                token: RwLock::new(None),
            }),
        })
    }

    // =========================================================================
    // OAuth2
    // =========================================================================

    /// A valid access token, waiting for the provider if it is not reachable yet.
    async fn access_token(&self) -> ServiceResult<String> {
        if let Some(token) = self.inner.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let mut cached = self.inner.token.write().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let poll = self.inner.poll;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.fetch_token().await {
                Ok(token) => {
                    let value = token.value.clone();
                    *cached = Some(token);
                    return Ok(value);
                }
                Err(e) if e.is_transient() && poll.allows(attempts) => {
                    debug!(attempts, error = %e, "Payment provider not ready, retrying");
                    tokio::time::sleep(poll.interval).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(ServiceError::Timeout {
                        service: SERVICE,
                        attempts,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_token(&self) -> ServiceResult<CachedToken> {
        let url = format!("{}/v1/oauth2/token", self.inner.api_base);
        let response = self
            .inner
            .http
            .post(&url)
            .basic_auth(&self.inner.client_id, Some(&self.inner.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(ServiceError::rejected(SERVICE, response).await);
        }

        let token: TokenResponse = response.json().await.map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        debug!(expires_in = token.expires_in, "Payment provider token obtained");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    // =========================================================================
    // Checkout Orders
    // =========================================================================

    /// Creates a provider order for `amount`. Returns the provider order id.
    pub async fn create_order(&self, request: &CreateOrderRequest) -> ServiceResult<CreateOrderResponse> {
        let currency = request.currency.as_deref().unwrap_or(&self.inner.currency);
        let mut unit = json!({
            "amount": {
                "currency_code": currency,
                "value": self.format_amount(request.amount),
            }
        });
        if let Some(order_id) = request.order_data.get("orderId").and_then(|v| v.as_str()) {
            unit["custom_id"] = json!(order_id);
        }
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [unit],
        });

        let order = self.post("/v2/checkout/orders", &body).await?;
        info!(provider_order = %order.id, amount = %request.amount, currency, "Payment order created");
        Ok(CreateOrderResponse { id: order.id })
    }

    /// Captures an approved provider order.
    pub async fn capture_order(&self, provider_order_id: &str) -> ServiceResult<CaptureOrderResponse> {
        let path = format!("/v2/checkout/orders/{}/capture", provider_order_id);
        let order = self.post(&path, &json!({})).await?;
        info!(provider_order = %order.id, status = %order.status, "Payment order captured");
        Ok(CaptureOrderResponse {
            status: order.status,
            id: order.id,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> ServiceResult<ProviderOrder> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.inner.api_base, path);

        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked early; the next call fetches a new one.
            *self.inner.token.write().await = None;
        }
        if !response.status().is_success() {
            return Err(ServiceError::rejected(SERVICE, response).await);
        }

        response.json().await.map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    fn format_amount(&self, amount: Money) -> String {
        amount.to_decimal_string(self.inner.decimals)
    }
}
