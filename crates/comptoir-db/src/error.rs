//! # Database Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                           CoreError (rule refusals)       │
//! │   ├── Database(kind = Unique)   ──► UniqueViolation                    │
//! │   ├── Database(kind = FK)       ──► ForeignKeyViolation                │
//! │   ├── Database(code 5 / 517)    ──► Busy                               │
//! │   ├── Database(other)           ──► Query                              │
//! │   ├── PoolTimedOut              ──► PoolExhausted                      │
//! │   └── anything else             ──► Internal                           │
//! │                    │                              │                     │
//! │                    └────────────► DbError ◄───────┘                     │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                          ApiError (admin-api)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `NotFound`, the constraint violations and `Core` carry anything the
//! dashboard may see. The rest is logged by the API and reported generically.

use comptoir_core::{CoreError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLITE_BUSY and SQLITE_BUSY_SNAPSHOT.
const SQLITE_BUSY_CODES: [&str; 2] = ["5", "517"];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A code already in some pool, or an order number taken by a
    /// concurrent submit.
    #[error("Duplicate value for {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Out of stock, settled row, wrong entry kind...
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Another writer held the database longer than the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    // "UNIQUE constraint failed: ticket_codes.code"
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        constraint: message
                            .split_once(": ")
                            .map(|(_, c)| c.to_string())
                            .unwrap_or(message),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    _ if db_err
                        .code()
                        .is_some_and(|code| SQLITE_BUSY_CODES.contains(&&*code)) =>
                    {
                        DbError::Busy(message)
                    }
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    #[tokio::test]
    async fn test_constraint_failures_are_classified() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        // No such ticket type.
        let err: DbError = sqlx::query(
            "INSERT INTO ticket_codes (id, ticket_id, code, status, created_at) VALUES ('c1', 'missing', 'W1H-1', 'available', ?1)",
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap_err()
        .into();
        assert!(matches!(err, DbError::ForeignKeyViolation(_)), "{err:?}");

        let ticket = db.tickets().create("1h", comptoir_core::Money::from_minor(500)).await.unwrap();
        db.tickets()
            .import_codes(&ticket.id, &["W1H-1".to_string()])
            .await
            .unwrap();
        let err: DbError = sqlx::query(
            "INSERT INTO ticket_codes (id, ticket_id, code, status, created_at) VALUES ('c2', ?1, 'W1H-1', 'available', ?2)",
        )
        .bind(&ticket.id)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap_err()
        .into();
        match err {
            DbError::UniqueViolation { constraint } => assert_eq!(constraint, "ticket_codes.code"),
            other => panic!("expected a unique violation, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_lands_in_core() {
        let err = DbError::from(ValidationError::required("amount"));
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }
}
