//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Comptoir                               │
//! │                                                                         │
//! │  Dashboard                   Rust Backend                               │
//! │  ─────────                   ────────────                               │
//! │                                                                         │
//! │  POST /api/tickets/t1/use                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler                                                         │  │
//! │  │  Result<Json<T>, ApiError>                                       │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed("...") ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Rule refused? ─── CoreError::OutOfStock ──────── ApiError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Provider down? ── ServiceError::Timeout ─────────────┘          │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  409 {"code":"OUT_OF_STOCK","message":"Ticket type t1 is out of stock"}│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal details (SQL errors, provider bodies) are logged and replaced by
//! a generic message before they reach the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use comptoir_core::{CoreError, ValidationError};
use comptoir_db::DbError;

use crate::services::ServiceError;

/// Error body returned by every failing endpoint.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "History entry not found: 6f1c..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// No stock left for a ticket type (409)
    OutOfStock,

    /// A business rule refused the operation (422)
    BusinessLogic,

    /// An optional integration is not set up (503)
    ConfigurationError,

    /// An external service did not answer in time (504)
    ExternalServiceTimeout,

    /// An external service failed or was unreachable (502)
    NetworkError,

    /// Database operation failed (500)
    DatabaseError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::OutOfStock => StatusCode::CONFLICT,
            ErrorCode::BusinessLogic => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ConfigurationError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ExternalServiceTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { constraint } => {
                tracing::warn!(constraint = %constraint, "Unique constraint refused a write");
                ApiError::new(ErrorCode::ValidationError, "Value already exists")
            }
            DbError::Core(e) => ApiError::from(e),
            DbError::ForeignKeyViolation(message) => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Busy(e) => {
                tracing::error!("Database busy: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database busy, try again in a moment")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::TicketNotFound(id) => ApiError::not_found("Ticket type", &id),
            CoreError::HistoryEntryNotFound(id) => ApiError::not_found("History entry", &id),
            CoreError::LineItemNotFound(id) => ApiError::not_found("Line item", &id),
            CoreError::OutOfStock { .. } => ApiError::new(ErrorCode::OutOfStock, message),
            CoreError::InvalidEntryKind { .. }
            | CoreError::EntrySettled(_)
            | CoreError::QuoteRequired { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::OrderNotPending { .. } => ApiError::new(ErrorCode::BusinessLogic, message),
            CoreError::QuantityTooLarge { .. } => ApiError::validation(message),
            CoreError::Validation(e) => ApiError::from(e),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts outbound service errors to API errors.
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::NotConfigured(message) => {
                ApiError::new(ErrorCode::ConfigurationError, message.clone())
            }
            ServiceError::Timeout { .. } => {
                tracing::warn!("{}", err);
                ApiError::new(ErrorCode::ExternalServiceTimeout, err.to_string())
            }
            ServiceError::Network { service, .. } => {
                tracing::error!("{}", err);
                ApiError::new(
                    ErrorCode::NetworkError,
                    format!("{} is unreachable, try again in a moment", service),
                )
            }
            ServiceError::Rejected { service, .. } | ServiceError::InvalidResponse { service, .. } => {
                tracing::error!("{}", err);
                ApiError::new(
                    ErrorCode::NetworkError,
                    format!("{} could not process the request", service),
                )
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use comptoir_core::{EntryKind, OrderStatus};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_core_error_status_codes() {
        assert_eq!(
            status_of(CoreError::OutOfStock {
                ticket_id: "t1".to_string()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CoreError::TicketNotFound("t1".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::EntrySettled("h1".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoreError::InvalidEntryKind {
                entry_id: "h1".to_string(),
                expected: EntryKind::Used,
                actual: EntryKind::Broken,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoreError::OrderNotPending {
                order_id: "o1".to_string(),
                status: OrderStatus::Cancelled,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ValidationError::required("reason")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_db_error_hides_internals() {
        let err = ApiError::from(DbError::QueryFailed("no such column: secret".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("secret"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let wrapped = ApiError::from(DbError::Core(CoreError::OutOfStock {
            ticket_id: "t1".to_string(),
        }));
        assert_eq!(wrapped.code, ErrorCode::OutOfStock);
    }

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(
            status_of(ServiceError::NotConfigured("off".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ServiceError::Timeout {
                service: "PayPal",
                attempts: 20
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(ServiceError::Network {
                service: "PayPal",
                message: "dns".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );

        let rejected = ApiError::from(ServiceError::Rejected {
            service: "PayPal",
            status: 400,
            message: "{\"debug_id\":\"abc\"}".to_string(),
        });
        assert!(!rejected.message.contains("debug_id"));
    }

    #[test]
    fn test_error_serialization() {
        let err = ApiError::not_found("Order", "o-1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Order not found: o-1");
    }
}
