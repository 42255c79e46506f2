//! Configuration management for the shop stock server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STOCK__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Which ledger store backs the server
    pub store: StoreConfig,

    /// Transfer workflow tuning
    pub transfers: TransferConfig,

    /// Notification timing shared with clients
    pub notifications: NotificationConfig,

    /// Transfer event bus
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret used to verify bearer tokens (issuance lives in the session service)
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    /// How often a transfer creation that lost a race is retried
    pub max_conflict_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Fallback refresh interval of the notification coordinator
    pub poll_interval_secs: u64,

    /// Delay before a dismissed arrival notice reopens
    pub arrival_reopen_secs: u64,

    /// Delay before a dismissed decline notice reopens
    pub decline_reopen_secs: u64,
}

impl NotificationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn arrival_reopen(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.arrival_reopen_secs as i64)
    }

    pub fn decline_reopen(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.decline_reopen_secs as i64)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            arrival_reopen_secs: 30,
            decline_reopen_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventConfig {
    /// Capacity of the broadcast channel feeding subscribers
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCK_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/shop_stock")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("store.backend", "postgres")?
            .set_default("transfers.max_conflict_retries", 3)?
            .set_default("notifications.poll_interval_secs", 60)?
            .set_default("notifications.arrival_reopen_secs", 30)?
            .set_default("notifications.decline_reopen_secs", 60)?
            .set_default("events.channel_capacity", 256)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCK__ prefix)
            .add_source(
                Environment::with_prefix("STOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration for in-process use and tests: memory store, defaults everywhere
    pub fn in_memory() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
            },
            transfers: TransferConfig {
                max_conflict_retries: 3,
            },
            notifications: NotificationConfig::default(),
            events: EventConfig {
                channel_capacity: 256,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
