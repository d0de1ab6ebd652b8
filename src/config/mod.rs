//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `TRUECHECKIA` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use truecheckia::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod cache;
mod error;
mod redis;
mod server;

pub use cache::CacheConfig;
pub use error::{ConfigError, ValidationError};
pub use self::redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// development setup. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis configuration (remote cache)
    #[serde(default)]
    pub redis: RedisConfig,

    /// In-process cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TRUECHECKIA` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TRUECHECKIA__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `TRUECHECKIA__REDIS__URL=...` -> `redis.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TRUECHECKIA")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.redis.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }

    /// Whether the Redis cache should be used instead of the in-process one.
    ///
    /// Requires both a production environment and a Redis URL.
    pub fn uses_remote_cache(&self) -> bool {
        self.is_production() && self.redis.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 5] = [
        "TRUECHECKIA__SERVER__PORT",
        "TRUECHECKIA__SERVER__ENVIRONMENT",
        "TRUECHECKIA__SERVER__ADMIN_TOKEN",
        "TRUECHECKIA__REDIS__URL",
        "TRUECHECKIA__CACHE__SWEEP_INTERVAL_SECS",
    ];

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.sweep_interval_secs, 300);
        assert!(!config.redis.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("TRUECHECKIA__SERVER__PORT", "3000");
        env::set_var("TRUECHECKIA__REDIS__URL", "redis://localhost:6379");
        env::set_var("TRUECHECKIA__CACHE__SWEEP_INTERVAL_SECS", "60");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.cache.sweep_interval_secs, 60);
    }

    #[test]
    fn test_remote_cache_requires_production_and_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("TRUECHECKIA__REDIS__URL", "redis://localhost:6379");
        let development = AppConfig::load().unwrap();
        env::set_var("TRUECHECKIA__SERVER__ENVIRONMENT", "production");
        let production = AppConfig::load().unwrap();
        env::remove_var("TRUECHECKIA__REDIS__URL");
        let production_without_url = AppConfig::load().unwrap();
        clear_env();

        assert!(!development.uses_remote_cache());
        assert!(production.uses_remote_cache());
        assert!(!production_without_url.uses_remote_cache());
    }

    #[test]
    fn test_validate_rejects_bad_redis_url() {
        let mut config = AppConfig::default();
        config.redis.url = "http://localhost".to_string();
        assert!(config.validate().is_err());
    }
}
