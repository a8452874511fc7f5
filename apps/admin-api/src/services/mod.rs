//! # Outbound Services
//!
//! Clients for the two external systems the back office talks to.
//!
//! - [`paypal`] - Payment provider bridge (create and capture checkout orders)
//! - [`import_cost`] - Landed-cost estimator for imported products
//!
//! Both are optional. An unconfigured service answers with
//! [`ServiceError::NotConfigured`] and the rest of the API keeps working.

pub mod import_cost;
pub mod paypal;

use thiserror::Error;

pub use import_cost::ImportCostClient;
pub use paypal::PayPalClient;

/// Failures talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service has no credentials or URL.
    #[error("{0}")]
    NotConfigured(String),

    /// The service did not become ready within the poll budget.
    #[error("{service} did not respond after {attempts} attempts, try again in a moment")]
    Timeout { service: &'static str, attempts: u32 },

    /// Transport failure (DNS, TLS, connection reset, request timeout).
    #[error("{service} is unreachable: {message}")]
    Network { service: &'static str, message: String },

    /// The service answered with an error status.
    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The service answered with a body we could not read.
    #[error("{service} sent an unexpected response: {message}")]
    InvalidResponse { service: &'static str, message: String },
}

impl ServiceError {
    pub(crate) fn network(service: &'static str, err: reqwest::Error) -> Self {
        ServiceError::Network {
            service,
            message: err.to_string(),
        }
    }

    /// Reads an error response into [`ServiceError::Rejected`].
    pub(crate) async fn rejected(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "no body".to_string());
        ServiceError::Rejected {
            service,
            status,
            message,
        }
    }

    /// Transport errors and 5xx answers are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network { .. } => true,
            ServiceError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let network = ServiceError::Network {
            service: "PayPal",
            message: "connection reset".to_string(),
        };
        assert!(network.is_transient());

        let server = ServiceError::Rejected {
            service: "PayPal",
            status: 503,
            message: String::new(),
        };
        assert!(server.is_transient());

        let client = ServiceError::Rejected {
            service: "PayPal",
            status: 401,
            message: String::new(),
        };
        assert!(!client.is_transient());
        assert!(!ServiceError::NotConfigured("off".to_string()).is_transient());
    }

    #[test]
    fn test_timeout_message_has_retry_hint() {
        let err = ServiceError::Timeout {
            service: "PayPal",
            attempts: 20,
        };
        assert_eq!(
            err.to_string(),
            "PayPal did not respond after 20 attempts, try again in a moment"
        );
    }
}
