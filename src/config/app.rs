//! Main application configuration
//!
//! Environment variable loading with validation, plus an optional TOML
//! file override for deployments that prefer files over env vars.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Queue-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Interval between stale-entry sweeps, in seconds
    pub sweep_interval_seconds: u64,
    /// Default queue entry lifetime, in minutes
    pub default_expiry_minutes: u64,
    /// Lower bound accepted by set_expiry, in minutes
    pub min_expiry_minutes: u64,
    /// Upper bound accepted by set_expiry, in minutes
    pub max_expiry_minutes: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pug-ladder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 60,
            default_expiry_minutes: 120, // 2 hours
            min_expiry_minutes: 10,
            max_expiry_minutes: 240, // 4 hours
        }
    }
}

impl QueueSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn default_expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.default_expiry_minutes as i64)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.service.log_level = level;
        }
        if let Ok(interval) = env::var("QUEUE_SWEEP_INTERVAL_SECONDS") {
            config.queue.sweep_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("QUEUE_SWEEP_INTERVAL_SECONDS must be a positive integer"))?;
        }
        if let Ok(minutes) = env::var("QUEUE_DEFAULT_EXPIRY_MINUTES") {
            config.queue.default_expiry_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("QUEUE_DEFAULT_EXPIRY_MINUTES must be a positive integer"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then validate
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.queue.sweep_interval_seconds == 0 {
            return Err(anyhow!("Queue sweep interval must be greater than zero"));
        }
        if self.queue.min_expiry_minutes >= self.queue.max_expiry_minutes {
            return Err(anyhow!(
                "Minimum queue expiry must be below the maximum ({} >= {})",
                self.queue.min_expiry_minutes,
                self.queue.max_expiry_minutes
            ));
        }
        if self.queue.default_expiry_minutes < self.queue.min_expiry_minutes
            || self.queue.default_expiry_minutes > self.queue.max_expiry_minutes
        {
            return Err(anyhow!(
                "Default queue expiry {}m must fall within [{}m, {}m]",
                self.queue.default_expiry_minutes,
                self.queue.min_expiry_minutes,
                self.queue.max_expiry_minutes
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.service.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', expected one of {:?}",
                self.service.log_level,
                valid_levels
            ));
        }

        Ok(())
    }
}
