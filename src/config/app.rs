//! Main application configuration
//!
//! This module defines the primary configuration structures for the matchday
//! service, including environment variable and TOML file loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use super::rating::RatingConfig;
use crate::types::RegionGranularity;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub amqp: AmqpSettings,
    pub matchmaking: MatchmakingSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the match API
    pub http_port: u16,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP connection settings for outbound notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpSettings {
    /// Publish notifications to the broker; when false they are only logged
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Topic exchange for match notifications
    pub exchange_name: String,
    /// Maximum retry attempts for connecting and publishing
    pub max_retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Maximum rating difference for two clubs to be paired
    pub rating_band: i32,
    /// How precisely regions must agree
    pub region_granularity: RegionGranularity,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "matchday".to_string(),
            log_level: "info".to_string(),
            http_port: 8000,
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            exchange_name: "matchday.notifications".to_string(),
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            rating_band: 200,
            region_granularity: RegionGranularity::PrimaryAndSecondary,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Some(port) = parse_env("HTTP_PORT")? {
            config.service.http_port = port;
        }
        if let Some(port) = parse_env("HEALTH_PORT")? {
            config.service.health_port = port;
        }
        if let Some(timeout) = parse_env("SHUTDOWN_TIMEOUT_SECONDS")? {
            config.service.shutdown_timeout_seconds = timeout;
        }

        // AMQP settings
        if let Some(enabled) = parse_env("AMQP_ENABLED")? {
            config.amqp.enabled = enabled;
        }
        if let Ok(host) = env::var("AMQP_HOST") {
            config.amqp.host = host;
        }
        if let Some(port) = parse_env("AMQP_PORT")? {
            config.amqp.port = port;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            config.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            config.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            config.amqp.vhost = vhost;
        }
        if let Ok(exchange) = env::var("AMQP_EXCHANGE_NAME") {
            config.amqp.exchange_name = exchange;
        }
        if let Some(retries) = parse_env("AMQP_MAX_RETRY_ATTEMPTS")? {
            config.amqp.max_retry_attempts = retries;
        }
        if let Some(delay) = parse_env("AMQP_RETRY_DELAY_MS")? {
            config.amqp.retry_delay_ms = delay;
        }

        // Matchmaking settings
        if let Some(band) = parse_env("RATING_BAND")? {
            config.matchmaking.rating_band = band;
        }
        if let Ok(granularity) = env::var("REGION_GRANULARITY") {
            config.matchmaking.region_granularity = granularity
                .parse()
                .map_err(|_| anyhow!("Invalid REGION_GRANULARITY value: {}", granularity))?;
        }

        // Rating settings
        if let Some(k) = parse_env("ELO_K_FACTOR")? {
            config.rating.k_factor = k;
        }
        if let Some(initial) = parse_env("INITIAL_RATING")? {
            config.rating.initial_rating = initial;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get retry delay as Duration
    pub fn amqp_retry_delay(&self) -> Duration {
        Duration::from_millis(self.amqp.retry_delay_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.http_port == config.service.health_port {
        return Err(anyhow!(
            "HTTP port and health port must differ (both {})",
            config.service.http_port
        ));
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate AMQP settings only when notifications go to the broker
    if config.amqp.enabled {
        if config.amqp.host.is_empty() {
            return Err(anyhow!("AMQP host cannot be empty"));
        }
        if config.amqp.exchange_name.is_empty() {
            return Err(anyhow!("AMQP exchange name cannot be empty"));
        }
    }

    // Validate matchmaking settings
    if config.matchmaking.rating_band < 0 {
        return Err(anyhow!("Rating band cannot be negative"));
    }

    config.rating.validate()?;

    Ok(())
}
