//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Environment keys recognized without a prefix.
const RAW_ENV_KEYS: &[&str] = &[
    "DATABASE_URL",
    "DATA_DIR",
    "PUBLIC_BASE_URL",
    "IDENTITY_PROVIDER_URL",
    "IDENTITY_PROVIDER_ANON_KEY",
    "IDENTITY_PROVIDER_JWT_SECRET",
    "NOTIFICATION_WORKER_ENABLED",
    "ESCALATION_TICK_INTERVAL",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid escalation tick interval: {0}. Must be at least 1 second")]
    InvalidEscalationTick(u64),

    #[error("Invalid HTTP port: 0")]
    InvalidHttpPort,
}

/// Configuration loader.
///
/// Precedence (lowest to highest):
/// 1. Programmatic defaults
/// 2. vigil.yaml in the working directory
/// 3. Well-known raw environment keys (DATABASE_URL, DATA_DIR, ...)
/// 4. VIGIL_-prefixed environment variables (nested via `__`)
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("vigil.yaml"))
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load from a specific file, still honoring environment overrides.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.escalation_tick_interval == 0 {
            return Err(ConfigError::InvalidEscalationTick(config.escalation_tick_interval));
        }

        if config.http.port == 0 {
            return Err(ConfigError::InvalidHttpPort);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config { database_url: "sqlite:vigil.db".to_string(), ..Config::default() }
    }

    #[test]
    fn test_validate_accepts_defaults_with_database_url() {
        assert!(ConfigLoader::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_database_url_required() {
        let config = Config::default();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = valid_config();
        config.escalation_tick_interval = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidEscalationTick(0))
        ));
    }
}
