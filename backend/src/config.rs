//! Configuration management for the Meadery inventory system
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with MEADERY_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Password hashing configuration
    pub auth: AuthConfig,

    /// Inventory defaults
    pub inventory: InventoryConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// How long a writer waits for a locked database
    pub busy_timeout_secs: u64,

    /// Create the database file on first start
    pub create_if_missing: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Low-stock threshold given to materials created without one
    #[serde(with = "rust_decimal::serde::str")]
    pub default_min_quantity: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("MEADERY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.url", "sqlite://meadery.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.busy_timeout_secs", 5)?
            .set_default("database.create_if_missing", true)?
            .set_default("auth.bcrypt_cost", bcrypt::DEFAULT_COST)?
            .set_default("inventory.default_min_quantity", "10")?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MEADERY_ prefix)
            .add_source(
                Environment::with_prefix("MEADERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_min_quantity: Decimal::from(10),
        }
    }
}
