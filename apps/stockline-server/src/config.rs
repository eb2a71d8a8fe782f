//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use stockline_core::InvoicePartition;
use stockline_db::{DbConfig, EditStockPolicy, SaleEngineConfig};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size; writers still run one at a time
    pub max_connections: u32,

    /// Whether invoice numbers run per organisation or per branch
    pub invoice_partition: InvoicePartition,

    /// What editing a committed sale does to stock
    pub edit_stock_policy: EditStockPolicy,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = ServerConfig {
            bind_addr: var("STOCKLINE_BIND_ADDR", "0.0.0.0:8080")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKLINE_BIND_ADDR".to_string()))?,

            database_path: PathBuf::from(var("STOCKLINE_DATABASE_PATH", "./stockline.db")),

            max_connections: var("STOCKLINE_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKLINE_MAX_CONNECTIONS".to_string()))?,

            invoice_partition: var("STOCKLINE_INVOICE_PARTITION", "organisation")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKLINE_INVOICE_PARTITION".to_string()))?,

            edit_stock_policy: var("STOCKLINE_EDIT_STOCK_POLICY", "metadata_only")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKLINE_EDIT_STOCK_POLICY".to_string()))?,

            log_level: var("STOCKLINE_LOG_LEVEL", "info"),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("STOCKLINE_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Pool settings for [`stockline_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.max_connections)
    }

    /// Engine options.
    pub fn engine_config(&self) -> SaleEngineConfig {
        SaleEngineConfig::default()
            .invoice_partition(self.invoice_partition)
            .edit_stock_policy(self.edit_stock_policy)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
