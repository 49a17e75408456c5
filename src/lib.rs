//! Client-side cache for Trapeze-style vehicle location APIs.
//!
//! Serves low-latency id, trip and bounding-box lookups without hammering
//! the upstream: every query passes through a TTL-gated refresh coordinator
//! ([`VehicleStorage`]) that coalesces concurrent refreshes into a single
//! in-flight upstream request, then reads from an in-memory indexed dataset
//! with per-record expiry.
//!
//! ```no_run
//! use vehicle_cache::{AppConfig, TrapezeClient, VehicleStorage};
//!
//! # async fn run() -> Result<(), vehicle_cache::VehicleCacheError> {
//! let config = AppConfig::load()?;
//! let client = TrapezeClient::new(&config.upstream)?;
//! let storage = VehicleStorage::with_config(client, &config.cache);
//!
//! let vehicle = storage.vehicle("652").await?;
//! println!("{vehicle:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod gate;
pub mod models;
pub mod storage;
mod time;

pub use client::{PositionType, TrapezeClient, VehicleProvider};
pub use config::{AppConfig, CacheConfig, UpstreamConfig};
pub use dataset::{BoundingBox, VehicleDataset};
pub use errors::VehicleCacheError;
pub use models::{RawVehicleEntry, VehicleLocation, VehicleLocationBatch};
pub use storage::{ErrorStatus, LoadStatus, SuccessStatus, VehicleStorage};
