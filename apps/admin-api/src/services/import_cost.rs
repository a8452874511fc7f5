//! # Import-Cost Estimator Client
//!
//! Forwards a validated [`ImportEstimateRequest`] to the external landed-cost
//! service and returns its breakdown. The request carries a bounded timeout;
//! a slow estimator surfaces as a gateway timeout, never a hung handler.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use comptoir_core::import::{ImportEstimate, ImportEstimateRequest};

use super::{ServiceError, ServiceResult};
use crate::config::AdminConfig;

const SERVICE: &str = "Import estimator";

/// Shown when `import.estimator_url` is not set.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Import cost estimation is not configured: set COMPTOIR_IMPORT_ESTIMATOR_URL";

/// Client for `POST {estimator_url}/estimate`.
#[derive(Debug, Clone)]
pub struct ImportCostClient {
    http: Client,
    base_url: String,
}

impl ImportCostClient {
    /// Builds a client from the `[import]` section, `None` when no URL is set.
    pub fn from_config(config: &AdminConfig) -> ServiceResult<Option<Self>> {
        match config.estimator_url() {
            Some(url) => Self::new(url, Duration::from_secs(config.import.timeout_secs)).map(Some),
            None => {
                warn!("Import estimator not configured, estimates disabled");
                Ok(None)
            }
        }
    }

    pub fn new(base_url: &str, timeout: Duration) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::network(SERVICE, e))?;

        Ok(ImportCostClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Requests an estimate. `request` must already be validated.
    pub async fn estimate(&self, request: &ImportEstimateRequest) -> ServiceResult<ImportEstimate> {
        let url = format!("{}/estimate", self.base_url);
        debug!(mode = ?request.mode, warehouse = %request.warehouse, "Requesting import estimate");

        let response = self
            .http
            .post(&url)
            .json(&request.for_estimator())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        service: SERVICE,
                        attempts: 1,
                    }
                } else {
                    ServiceError::network(SERVICE, e)
                }
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::rejected(SERVICE, response).await);
        }

        let estimate: ImportEstimate = response.json().await.map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        info!(
            product = %request.product_name,
            suggested_price = %estimate.suggested_price,
            transit = %estimate.transit_time,
            "Import estimate received"
        );
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use comptoir_core::import::TransportMode;
    use comptoir_core::Money;
    use serde_json::json;

    fn request(mode: TransportMode) -> ImportEstimateRequest {
        ImportEstimateRequest {
            product_name: "Switch 24 ports".to_string(),
            mode,
            supplier_price: Money::from_minor(12_000),
            supplier_currency: "USD".to_string(),
            weight: 3.5,
            warehouse: "Guangzhou".to_string(),
            volume: Some(0.2),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_estimate_round_trip() {
        let app = Router::new().route(
            "/estimate",
            post(|Json(body): Json<serde_json::Value>| async move {
                // Air freight never sends a volume and the product name stays local.
                assert!(body.get("volume").is_none());
                assert!(body.get("productName").is_none());
                assert_eq!(body["mode"], "air");
                Json(json!({
                    "transportCost": 4000,
                    "customsDuty": 1500,
                    "vat": 2000,
                    "handlingFee": 500,
                    "totalCostLocal": 20000,
                    "suggestedPrice": 26000,
                    "marginPercent": 30.0,
                    "transitTime": "5-7 days"
                }))
            }),
        );
        let base = serve(app).await;
        let client = ImportCostClient::new(&base, Duration::from_secs(5)).unwrap();

        let estimate = client.estimate(&request(TransportMode::Air)).await.unwrap();
        assert_eq!(estimate.suggested_price, Money::from_minor(26_000));
        assert_eq!(estimate.transit_time, "5-7 days");
    }

    #[tokio::test]
    async fn test_slow_estimator_times_out() {
        let app = Router::new().route(
            "/estimate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({}))
            }),
        );
        let base = serve(app).await;
        let client = ImportCostClient::new(&base, Duration::from_millis(50)).unwrap();

        let err = client.estimate(&request(TransportMode::Sea)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let app = Router::new().route(
            "/estimate",
            post(|| async { (axum::http::StatusCode::UNPROCESSABLE_ENTITY, "unknown warehouse") }),
        );
        let base = serve(app).await;
        let client = ImportCostClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client.estimate(&request(TransportMode::Air)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { status: 422, .. }));
    }

    #[test]
    fn test_unconfigured() {
        let config = AdminConfig::default();
        assert!(ImportCostClient::from_config(&config).unwrap().is_none());
    }
}
