//! Upstream vehicle location providers.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::errors::VehicleCacheError;
use crate::models::VehicleLocationBatch;

/// Position processing the upstream applies to reported coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionType {
    Raw,
    #[default]
    Corrected,
}

impl PositionType {
    /// Value used in the upstream query string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Raw => "RAW",
            PositionType::Corrected => "CORRECTED",
        }
    }
}

/// Source of vehicle location batches.
///
/// One operation: fetch the current batch, or fail with an arbitrary error.
/// The cache layer records failures as status data instead of retrying.
#[async_trait]
pub trait VehicleProvider: Send + Sync {
    async fn vehicle_locations(&self) -> Result<VehicleLocationBatch, VehicleCacheError>;
}

const VEHICLES_PATH: &str =
    "/internetservice/geoserviceDispatcher/services/vehicleinfo/vehicles";

/// HTTP client for a Trapeze-style geoservice dispatcher.
#[derive(Debug)]
pub struct TrapezeClient {
    endpoint: String,
    position_type: PositionType,
    http: reqwest::Client,
}

impl TrapezeClient {
    /// Build a client for the configured endpoint base URL.
    pub fn new(config: &UpstreamConfig) -> Result<Self, VehicleCacheError> {
        config.validate()?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            position_type: config.position_type,
            http,
        })
    }
}

#[async_trait]
impl VehicleProvider for TrapezeClient {
    async fn vehicle_locations(&self) -> Result<VehicleLocationBatch, VehicleCacheError> {
        let url = format!("{}{}", self.endpoint, VEHICLES_PATH);
        debug!(%url, "requesting vehicle locations");
        let batch = self
            .http
            .get(&url)
            .query(&[
                ("colorType", "ROUTE"),
                ("positionType", self.position_type.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(batch)
    }
}
