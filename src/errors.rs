//! Errors for the vehicle cache.
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VehicleCacheError {
    #[error("upstream request failed")]
    Http(#[from] reqwest::Error),

    #[error("serialization error")]
    Serde(#[from] serde_json::Error),

    #[error("configuration error")]
    Config(#[from] config::ConfigError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A query ran against a status recorded by a failed refresh; the
    /// original upstream error is carried inside, shared between every
    /// caller that coalesced on that attempt.
    #[error("upstream fetch failed: {0}")]
    Upstream(Arc<VehicleCacheError>),

    #[error("vehicle {id} not found")]
    VehicleNotFound { id: String },

    #[error("trip {id} not found")]
    TripNotFound { id: String },

    #[error("invalid bounding box: {message}")]
    InvalidBoundingBox { message: String },

    #[error("fetch completed without a status")]
    NoStatus,
}

impl VehicleCacheError {
    /// Conventional HTTP status code for a serving layer to map to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::VehicleNotFound { .. } | Self::TripNotFound { .. } => 404,
            Self::InvalidBoundingBox { .. } => 400,
            Self::Http(_) | Self::Upstream(_) => 502,
            _ => 500,
        }
    }
}
