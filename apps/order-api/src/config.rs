//! Order API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use emporia_db::DbConfig;
use emporia_orders::OrdersConfig;

/// Order API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub db_max_connections: u32,

    /// How long a transaction waits for a row lock before failing
    pub db_lock_timeout_secs: u64,

    /// Redis connection string (optional)
    pub redis_url: Option<String>,

    /// How long a checkout result is replayed for its idempotency key
    pub idempotency_ttl_hours: u64,

    /// Requests running longer than this are aborted
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            http_port: parse_var("HTTP_PORT", "8080")?,

            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/emporia.db".to_string())
                .into(),

            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,

            db_lock_timeout_secs: parse_var("DB_LOCK_TIMEOUT_SECS", "30")?,

            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),

            idempotency_ttl_hours: parse_var("IDEMPOTENCY_TTL_HOURS", "24")?,

            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "30")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if self.idempotency_ttl_hours == 0 {
            return Err(ConfigError::InvalidValue("IDEMPOTENCY_TTL_HOURS".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()));
        }
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .lock_timeout(Duration::from_secs(self.db_lock_timeout_secs))
    }

    pub fn orders_config(&self) -> OrdersConfig {
        OrdersConfig::default()
            .idempotency_ttl(Duration::from_secs(self.idempotency_ttl_hours * 3600))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-wide, so every case lives in one test.
    #[test]
    fn test_load_from_env() {
        for name in [
            "HTTP_PORT",
            "DATABASE_PATH",
            "DB_MAX_CONNECTIONS",
            "DB_LOCK_TIMEOUT_SECS",
            "REDIS_URL",
            "IDEMPOTENCY_TTL_HOURS",
            "REQUEST_TIMEOUT_SECS",
        ] {
            env::remove_var(name);
        }

        let config = ApiConfig::load().unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.database_path, PathBuf::from("./data/emporia.db"));
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.db_lock_timeout_secs, 30);
        assert!(config.redis_url.is_none());
        assert_eq!(
            config.orders_config().idempotency_ttl,
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(30));

        env::set_var("HTTP_PORT", "9090");
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        let config = ApiConfig::load().unwrap();
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));

        env::set_var("HTTP_PORT", "not-a-port");
        assert!(matches!(
            ApiConfig::load(),
            Err(ConfigError::InvalidValue(name)) if name == "HTTP_PORT"
        ));
        env::remove_var("HTTP_PORT");

        env::set_var("IDEMPOTENCY_TTL_HOURS", "0");
        assert!(ApiConfig::load().is_err());
        env::remove_var("IDEMPOTENCY_TTL_HOURS");
        env::remove_var("REDIS_URL");
    }
}
