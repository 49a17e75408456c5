//! Application configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::client::PositionType;
use crate::errors::VehicleCacheError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Upstream endpoint settings.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the Trapeze geoservice dispatcher.
    pub endpoint: String,
    #[serde(default)]
    pub position_type: PositionType,
    /// HTTP request timeout in seconds.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

/// Refresh and expiry settings, milliseconds on the wire.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Minimum delay between upstream refresh attempts.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: Duration,
    /// Age beyond which a record stops being served.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_ttl")]
    pub ttl: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(10_000)
}

fn default_ttl() -> Duration {
    Duration::from_millis(300_000)
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            position_type: PositionType::default(),
            timeout: default_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            ttl: default_ttl(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("VEHICLECACHE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all configuration sections.
    pub fn validate(&self) -> Result<(), VehicleCacheError> {
        self.upstream.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

impl UpstreamConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), VehicleCacheError> {
        if self.endpoint.trim().is_empty() {
            return Err(VehicleCacheError::Configuration {
                message: "Upstream endpoint cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl CacheConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), VehicleCacheError> {
        if self.refresh_interval.is_zero() {
            return Err(VehicleCacheError::Configuration {
                message: "Refresh interval must be greater than zero".to_string(),
            });
        }
        if self.ttl.is_zero() {
            return Err(VehicleCacheError::Configuration {
                message: "Record TTL must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
