//! # Payment Provider Contract
//!
//! Shapes exchanged with the checkout widget and the provider bridge. The
//! provider itself is opaque; this module only knows the create/capture
//! contract, whether the provider is configured, and how long to wait for
//! it to come up.
//!
//! ```text
//! dashboard                  admin-api                    provider
//!    │ POST /payments/orders     │  POST /v2/checkout/orders    │
//!    │ {amount,currency,data} ──►│ ───────────────────────────► │
//!    │ ◄── {id} ─────────────────│ ◄─────────────────────────── │
//!    │ POST /payments/capture    │  POST .../{id}/capture       │
//!    │ {orderID, orderData} ────►│ ───────────────────────────► │
//!    │ ◄── {status, id} ─────────│ ◄─────────────────────────── │
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;

/// Shown instead of the checkout widget when no client id is set.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Online payment is not configured: set PAYPAL_CLIENT_ID to enable card and wallet checkout";

// =============================================================================
// Create / Capture
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub amount: Money,
    /// Falls back to the configured currency.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub order_data: serde_json::Value,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        if !self.amount.is_positive() {
            return Err(ValidationError::must_be_positive("amount"));
        }
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ValidationError::InvalidFormat {
                    field: "currency".to_string(),
                    reason: "expected a 3-letter ISO code".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateOrderResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CaptureOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "orderData", default)]
    #[ts(type = "unknown")]
    pub order_data: serde_json::Value,
}

impl CaptureOrderRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        let id = self.order_id.trim();
        if id.is_empty() {
            return Err(ValidationError::required("orderID"));
        }
        // The id ends up in the provider's URL path.
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError::InvalidFormat {
                field: "orderID".to_string(),
                reason: "only letters, digits and '-' are allowed".to_string(),
            });
        }
        Ok(())
    }

    /// Our own order id, when the dashboard passed it along in `orderData`.
    pub fn internal_order_id(&self) -> Option<&str> {
        self.order_data
            .get("orderId")
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CaptureOrderResponse {
    pub status: String,
    pub id: String,
}

impl CaptureOrderResponse {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("COMPLETED")
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Whether the provider can be used at all.
///
/// A missing client id is an ordinary state, not an error: the dashboard
/// shows [`NOT_CONFIGURED_MESSAGE`] and everything else keeps working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfig {
    Configured { client_id: String, currency: String },
    NotConfigured,
}

impl PaymentConfig {
    /// Blank client ids count as missing.
    pub fn from_client_id(client_id: Option<&str>, currency: &str) -> Self {
        match client_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => PaymentConfig::Configured {
                client_id: id.to_string(),
                currency: currency.to_string(),
            },
            None => PaymentConfig::NotConfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, PaymentConfig::Configured { .. })
    }

    /// What `GET /api/payments/config` returns.
    pub fn status(&self) -> PaymentConfigStatus {
        match self {
            PaymentConfig::Configured { client_id, currency } => PaymentConfigStatus {
                configured: true,
                client_id: Some(client_id.clone()),
                currency: Some(currency.clone()),
                message: None,
            },
            PaymentConfig::NotConfigured => PaymentConfigStatus {
                configured: false,
                client_id: None,
                currency: None,
                message: Some(NOT_CONFIGURED_MESSAGE.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Readiness Polling
// =============================================================================

/// How long to wait for the provider before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_millis(500),
            max_attempts: 20,
        }
    }
}

impl PollPolicy {
    /// Longest time a caller can spend polling.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Whether another attempt is allowed after `attempts_made`.
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_client_id_is_not_configured() {
        assert_eq!(
            PaymentConfig::from_client_id(None, "EUR"),
            PaymentConfig::NotConfigured
        );
        assert_eq!(
            PaymentConfig::from_client_id(Some("  "), "EUR"),
            PaymentConfig::NotConfigured
        );

        let status = PaymentConfig::NotConfigured.status();
        assert!(!status.configured);
        assert_eq!(status.message.as_deref(), Some(NOT_CONFIGURED_MESSAGE));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["configured"], false);
        assert!(json.get("clientId").is_none());
    }

    #[test]
    fn test_configured_status() {
        let config = PaymentConfig::from_client_id(Some("abc"), "EUR");
        assert!(config.is_configured());
        let status = config.status();
        assert_eq!(status.client_id.as_deref(), Some("abc"));
        assert!(status.message.is_none());
    }

    #[test]
    fn test_capture_request_wire_names() {
        let req: CaptureOrderRequest = serde_json::from_str(
            r#"{"orderID":"5O190127TN364715T","orderData":{"orderId":"o-1"}}"#,
        )
        .unwrap();
        assert_eq!(req.order_id, "5O190127TN364715T");
        assert_eq!(req.internal_order_id(), Some("o-1"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_capture_id_must_be_path_safe() {
        let capture = |id: &str| CaptureOrderRequest {
            order_id: id.to_string(),
            order_data: serde_json::Value::Null,
        };

        assert!(capture(" 8AB-12 ").validate().is_ok());
        for id in ["../v1/identity", "a/b", "5O19?x=1", "PP-25.00", "  "] {
            assert!(capture(id).validate().is_err(), "{id:?} accepted");
        }
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateOrderRequest =
            serde_json::from_str(r#"{"amount":2500,"currency":"EUR"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.order_data, serde_json::Value::Null);

        let bad = CreateOrderRequest {
            amount: Money::zero(),
            ..req.clone()
        };
        assert!(bad.validate().is_err());

        let bad_currency = CreateOrderRequest {
            currency: Some("EURO".to_string()),
            ..req
        };
        assert!(bad_currency.validate().is_err());
    }

    #[test]
    fn test_default_poll_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.budget(), Duration::from_secs(10));
        assert!(policy.allows(19));
        assert!(!policy.allows(20));
    }
}
