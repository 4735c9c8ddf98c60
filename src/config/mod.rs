//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod business;
mod server;
mod storage;

pub use business::{OrdersConfig, DEFAULT_PAYMENT_TEMPLATE};
pub use server::ServerConfig;
pub use storage::{
    CacheConfig, RetrySettings, StoreBackend, StoreConfig, DEFAULT_SHEETS_API_BASE,
};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LIVEORDER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LIVEORDER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LIVEORDER_LOG";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote store configuration.
    pub store: StoreConfig,
    /// Retry policy for every store call.
    pub retry: RetrySettings,
    /// Inventory cache configuration.
    pub cache: CacheConfig,
    /// Order submission settings.
    pub orders: OrdersConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Sheets {
            if self.store.document_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "store.document_id",
                    reason: "required for the sheets backend".to_string(),
                });
            }
            if self.store.access_token.is_none() && self.store.access_token_file.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "store.access_token",
                    reason: "either access_token or access_token_file is required".to_string(),
                });
            }
        }

        if self.orders.discounts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "orders.discounts",
                reason: "at least one discount percentage is required".to_string(),
            });
        }
        if let Some(bad) = self
            .orders
            .discounts
            .iter()
            .find(|d| !d.is_finite() || **d < 0.0 || **d > 100.0)
        {
            return Err(ConfigError::InvalidValue {
                field: "orders.discounts",
                reason: format!("{} is outside 0..=100", bad),
            });
        }

        self.orders.offset()?;
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.inventory_table, "Inventory");
        assert_eq!(config.store.orders_table, "Orders");
        assert_eq!(config.store.api_base, DEFAULT_SHEETS_API_BASE);
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.orders.debounce_ms, 1000);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
store:
  backend: sheets
  document_id: abc123
  access_token: secret
  inventory_table: Stock

retry:
  max_attempts: 3
  base_delay_ms: 100
  jitter: true

cache:
  ttl_secs: 60

orders:
  discounts: [10, 20, 39.9999999]
  utc_offset: "+08:00"

server:
  port: 9090
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sheets);
        assert_eq!(config.store.document_id, "abc123");
        assert_eq!(config.store.inventory_table, "Stock");
        assert_eq!(config.store.orders_table, "Orders");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert_eq!(config.retry.max_delay_ms, 16_000);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.orders.discounts, vec![10.0, 20.0, 39.9999999]);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sheets_backend_requires_document_and_token() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Sheets;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "store.document_id",
                ..
            })
        ));

        config.store.document_id = "doc".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "store.access_token",
                ..
            })
        ));

        config.store.access_token_file = Some("/run/secrets/token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_discount_rejected() {
        let mut config = Config::default();
        config.orders.discounts = vec![10.0, 120.0];
        assert!(config.validate().is_err());

        config.orders.discounts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let mut config = Config::default();
        config.orders.utc_offset = "Asia/Jakarta".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "orders.utc_offset",
                ..
            })
        ));
    }

    #[test]
    fn test_retry_settings_conversion() {
        let settings = RetrySettings {
            max_attempts: 0,
            deadline_secs: 0,
            ..Default::default()
        };
        let retry = settings.to_retry_config();
        assert_eq!(retry.max_attempts, 1);
        assert!(retry.deadline.is_none());

        let retry = RetrySettings::default().to_retry_config();
        assert_eq!(retry.base_delay, std::time::Duration::from_millis(500));
        assert_eq!(retry.deadline, Some(std::time::Duration::from_secs(60)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = Config::default();
        config.store.access_token = Some("ya29.very-secret".to_string());
        let printed = format!("{:?}", config.store);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_load_from_file_and_env() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "cache:\n  ttl_secs: 90\nserver:\n  port: 7000").unwrap();

        std::env::set_var("LIVEORDER__SERVER__PORT", "7100");
        let loaded = Config::load(file.path().to_str());
        std::env::remove_var("LIVEORDER__SERVER__PORT");

        let config = loaded.unwrap();
        assert_eq!(config.cache.ttl_secs, 90);
        assert_eq!(config.server.port, 7100);
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some("/nonexistent/liveorder.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
