//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Budget engine tuning.
    #[serde(default)]
    pub budgeting: BudgetingConfig,
    /// External feed call policy.
    #[serde(default)]
    pub feeds: FeedConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Budget engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetingConfig {
    /// Realization percentage at which a budget turns WARNING.
    pub warning_threshold: Decimal,
    /// Realization percentage at which a budget turns DANGER.
    pub danger_threshold: Decimal,
    /// Days of consumption history used to derive default meter weights.
    pub lookback_days: u32,
    /// Tolerance when checking that explicit weights sum to one.
    pub weight_epsilon: Decimal,
    /// Decimal places of the budget currency.
    pub currency_scale: u32,
    /// Largest budget total a draft may request.
    pub max_total_budget: Decimal,
}

impl Default for BudgetingConfig {
    fn default() -> Self {
        Self {
            warning_threshold: Decimal::from(80),
            danger_threshold: Decimal::ONE_HUNDRED,
            lookback_days: 90,
            weight_epsilon: Decimal::new(1, 6),
            currency_scale: 2,
            max_total_budget: Decimal::new(1_000_000_000_000_000, 0),
        }
    }
}

/// Price and billing feed call policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempts before the call degrades.
    pub max_attempts: u32,
    /// Base delay of the exponential backoff in milliseconds.
    pub backoff_base_ms: u64,
    /// How long a last known good value may be served as stale, in seconds.
    pub stale_ttl_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            max_attempts: 3,
            backoff_base_ms: 100,
            stale_ttl_secs: 3_600,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("ENERBUDGET").separator("__"));

        Self::from_builder(builder)
    }

    /// Builds configuration from an assembled set of sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources do not deserialize into `AppConfig`.
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}
