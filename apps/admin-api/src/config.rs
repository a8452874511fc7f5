//! # Admin API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority, .env honoured)            │
//! │     COMPTOIR_PORT=8080                                                 │
//! │     PAYPAL_CLIENT_ID=...                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/comptoir/admin.toml (Linux)                              │
//! │     ~/Library/Application Support/com.comptoir.comptoir/admin.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # admin.toml
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8080
//!
//! [database]
//! path = "./comptoir.db"
//! max_connections = 5
//!
//! [currency]
//! code = "EUR"
//! decimals = 2
//!
//! [payment]
//! client_id = "..."       # leave out to disable online payment
//! client_secret = "..."
//! api_base = "https://api-m.sandbox.paypal.com"
//!
//! [import]
//! estimator_url = "https://estimator.example.com"
//! timeout_secs = 15
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use comptoir_core::payment::PaymentConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address {}: {}", self.bind_addr, e)))
    }
}

/// SQLite file and pool size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./comptoir.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Currency amounts are displayed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_currency")]
    pub code: String,

    /// Minor-unit digits (2 for EUR, 0 for XOF).
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_decimals() -> u32 {
    2
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency(),
            decimals: default_decimals(),
        }
    }
}

/// Payment provider credentials. Everything is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSettings {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Falls back to `[currency] code`.
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_api_base() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

/// Import-cost estimator endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    #[serde(default)]
    pub estimator_url: Option<String>,

    #[serde(default = "default_import_timeout")]
    pub timeout_secs: u64,
}

fn default_import_timeout() -> u64 {
    15
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            estimator_url: None,
            timeout_secs: default_import_timeout(),
        }
    }
}

// =============================================================================
// Admin Config
// =============================================================================

/// Complete admin-api configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub import: ImportSettings,
}

impl AdminConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (admin.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => {
                info!(?path, "Loading admin config from file");
                Self::from_toml(&std::fs::read_to_string(&path)?)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.socket_addr()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        let code = &self.currency.code;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "currency.code must be a 3-letter ISO code, got: {}",
                code
            )));
        }
        if self.currency.decimals > 4 {
            return Err(ConfigError::Invalid("currency.decimals must be at most 4".into()));
        }

        if !self.payment.api_base.starts_with("http://") && !self.payment.api_base.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "payment.api_base must be an http(s) URL, got: {}",
                self.payment.api_base
            )));
        }

        if let Some(ref url) = self.import.estimator_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "import.estimator_url must be an http(s) URL, got: {}",
                    url
                )));
            }
        }
        if self.import.timeout_secs == 0 {
            return Err(ConfigError::Invalid("import.timeout_secs must be greater than 0".into()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("COMPTOIR_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(port) = var("COMPTOIR_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid COMPTOIR_PORT"),
            }
        }

        if let Some(path) = var("COMPTOIR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(code) = var("COMPTOIR_CURRENCY") {
            self.currency.code = code.trim().to_uppercase();
        }

        if let Some(id) = var("PAYPAL_CLIENT_ID") {
            self.payment.client_id = Some(id);
        }

        if let Some(secret) = var("PAYPAL_CLIENT_SECRET") {
            self.payment.client_secret = Some(secret);
        }

        if let Some(base) = var("PAYPAL_API_BASE") {
            self.payment.api_base = base;
        }

        if let Some(url) = var("COMPTOIR_IMPORT_ESTIMATOR_URL") {
            debug!(url = %url, "Overriding estimator URL from environment");
            self.import.estimator_url = Some(url);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "comptoir", "comptoir")
            .map(|dirs| dirs.config_dir().join("admin.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Currency used for provider orders.
    pub fn payment_currency(&self) -> &str {
        self.payment.currency.as_deref().unwrap_or(&self.currency.code)
    }

    /// Whether the checkout widget can be shown.
    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig::from_client_id(self.payment.client_id.as_deref(), self.payment_currency())
    }

    /// Estimator base URL, blank counts as unset.
    pub fn estimator_url(&self) -> Option<&str> {
        self.import
            .estimator_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
