//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PSYCHOMETRICS` prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use psychometric_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod analysis;
mod database;
mod error;
mod job;
mod server;

pub use analysis::{AnalysisConfig, HealthConfig};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use job::JobConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Only `database.url` is required; every other section has defaults.
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Scheduled recalculation
    #[serde(default)]
    pub job: JobConfig,

    /// Calculator thresholds
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `PSYCHOMETRICS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `PSYCHOMETRICS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PSYCHOMETRICS__DATABASE__URL=...` -> `database.url = ...`
    /// - `PSYCHOMETRICS__ANALYSIS__ITEM__MIN_RESPONSES=50` -> `analysis.item.min_responses = 50`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PSYCHOMETRICS")
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
    /// Returns `ValidationError` for the first invalid section found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.job.validate()?;
        self.analysis.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("PSYCHOMETRICS__DATABASE__URL", "postgresql://test@localhost/test");
    }

    fn clear_env() {
        env::remove_var("PSYCHOMETRICS__DATABASE__URL");
        env::remove_var("PSYCHOMETRICS__SERVER__PORT");
        env::remove_var("PSYCHOMETRICS__SERVER__ENVIRONMENT");
        env::remove_var("PSYCHOMETRICS__JOB__INTERVAL_SECS");
        env::remove_var("PSYCHOMETRICS__ANALYSIS__ITEM__MIN_RESPONSES");
        env::remove_var("PSYCHOMETRICS__ANALYSIS__DIF__CORRECT_THRESHOLD");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url(), "postgresql://test@localhost/test");
    }

    #[test]
    fn test_missing_database_url_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.job.interval_secs, 86_400);
        assert_eq!(config.analysis.item.min_responses, 50);
        assert_eq!(config.analysis.health.top_flagged, 10);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PSYCHOMETRICS__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PSYCHOMETRICS__SERVER__PORT", "3000");
        env::set_var("PSYCHOMETRICS__JOB__INTERVAL_SECS", "3600");
        env::set_var("PSYCHOMETRICS__ANALYSIS__ITEM__MIN_RESPONSES", "30");
        env::set_var("PSYCHOMETRICS__ANALYSIS__DIF__CORRECT_THRESHOLD", "0.6");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.job.interval_secs, 3600);
        assert_eq!(config.analysis.item.min_responses, 30);
        assert_eq!(config.analysis.dif.correct_threshold, dec!(0.6));
    }
}
