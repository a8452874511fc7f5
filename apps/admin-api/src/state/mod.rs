//! # Application State
//!
//! Everything handlers share, cloned into each request by axum.
//!
//! ```text
//! AppState
//! ├── db         Database (SqlitePool inside, cheap clone)
//! ├── cart       CartState (Arc<Mutex<Cart>>)
//! ├── config     Arc<AdminConfig>
//! ├── paypal     Option<PayPalClient>      None = not configured
//! └── estimator  Option<ImportCostClient>  None = not configured
//! ```

pub mod cart;

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use comptoir_core::payment::NOT_CONFIGURED_MESSAGE;
use comptoir_db::Database;

pub use cart::CartState;

use crate::config::AdminConfig;
use crate::services::{import_cost, ImportCostClient, PayPalClient, ServiceError, ServiceResult};

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub cart: CartState,
    pub config: Arc<AdminConfig>,
    pub paypal: Option<PayPalClient>,
    pub estimator: Option<ImportCostClient>,
}

impl AppState {
    /// Builds the state, creating the outbound clients that are configured.
    pub fn new(db: Database, config: AdminConfig) -> ServiceResult<Self> {
        let paypal = PayPalClient::from_config(&config)?;
        let estimator = ImportCostClient::from_config(&config)?;
        Ok(AppState {
            db,
            cart: CartState::new(),
            config: Arc::new(config),
            paypal,
            estimator,
        })
    }

    pub fn paypal(&self) -> ServiceResult<&PayPalClient> {
        self.paypal
            .as_ref()
            .ok_or_else(|| ServiceError::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))
    }

    pub fn estimator(&self) -> ServiceResult<&ImportCostClient> {
        self.estimator
            .as_ref()
            .ok_or_else(|| ServiceError::NotConfigured(import_cost::NOT_CONFIGURED_MESSAGE.to_string()))
    }
}

/// The business day requests default to.
pub fn business_today() -> NaiveDate {
    Local::now().date_naive()
}
