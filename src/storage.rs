//! Refresh coordination and query surface.
//!
//! [`VehicleStorage`] sits between callers and the upstream provider. Every
//! query first ensures a fresh-enough refresh attempt exists: a due refresh
//! is performed by exactly one caller while everyone else queues on the
//! single-flight gate, and the outcome — success or failure — is recorded
//! as a status snapshot all queries consult.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::VehicleProvider;
use crate::config::CacheConfig;
use crate::dataset::{BoundingBox, VehicleDataset};
use crate::errors::VehicleCacheError;
use crate::gate::FetchGate;
use crate::models::VehicleLocation;
use crate::time::now_millis;

/// Outcome of the most recent completed refresh attempt.
#[derive(Debug, Clone)]
pub enum LoadStatus {
    Success(SuccessStatus),
    Error(ErrorStatus),
}

/// A refresh that completed against the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessStatus {
    /// Timestamp declared by the upstream batch, Unix milliseconds.
    pub last_update: i64,
    /// Wall-clock time the refresh completed, Unix milliseconds.
    pub timestamp: i64,
}

/// A refresh that failed; the upstream error becomes data.
#[derive(Debug, Clone)]
pub struct ErrorStatus {
    /// Error raised by the upstream fetch, shared between all callers that
    /// coalesced on the failed attempt.
    pub error: Arc<VehicleCacheError>,
    /// Wall-clock time of the failure, Unix milliseconds.
    pub timestamp: i64,
}

impl LoadStatus {
    /// Wall-clock completion time of the attempt, Unix milliseconds.
    pub fn timestamp(&self) -> i64 {
        match self {
            LoadStatus::Success(status) => status.timestamp,
            LoadStatus::Error(status) => status.timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoadStatus::Success(_))
    }
}

/// TTL-gated cache over an upstream vehicle location provider.
///
/// One instance per upstream endpoint. The dataset and the status cell are
/// only mutated here, during a refresh; readers never mutate.
pub struct VehicleStorage<P> {
    provider: P,
    refresh_interval_millis: i64,
    dataset: Mutex<VehicleDataset>,
    status: Mutex<Option<LoadStatus>>,
    gate: FetchGate,
}

impl<P: VehicleProvider> VehicleStorage<P> {
    /// Create a storage refreshing at most every `refresh_interval_millis`
    /// and serving records no older than `ttl_millis`.
    pub fn new(provider: P, refresh_interval_millis: i64, ttl_millis: i64) -> Self {
        Self {
            provider,
            refresh_interval_millis,
            dataset: Mutex::new(VehicleDataset::new(ttl_millis)),
            status: Mutex::new(None),
            gate: FetchGate::new(),
        }
    }

    /// Create a storage from a [`CacheConfig`].
    pub fn with_config(provider: P, config: &CacheConfig) -> Self {
        Self::new(
            provider,
            config.refresh_interval.as_millis() as i64,
            config.ttl.as_millis() as i64,
        )
    }

    /// Most recent status snapshot, if any attempt ever completed.
    pub async fn status(&self) -> Option<LoadStatus> {
        self.status.lock().await.clone()
    }

    /// Whether a refresh is due, evaluated against the wall clock on every
    /// call. True before the first attempt ever completes.
    pub async fn update_required(&self) -> bool {
        self.update_required_at(now_millis()).await
    }

    pub(crate) async fn update_required_at(&self, now: i64) -> bool {
        match self.status.lock().await.as_ref() {
            Some(status) => status.timestamp() + self.refresh_interval_millis < now,
            None => true,
        }
    }

    /// Ensure a fresh-enough refresh attempt exists and return its status.
    ///
    /// Not due: the existing status is returned as-is, error statuses
    /// included — staleness tolerance wins over retry-on-read. A refresh
    /// already in flight is awaited rather than duplicated; the waiter
    /// observes whatever status is current when the gate opens, which may
    /// belong to an even newer refresh. Otherwise this caller performs the
    /// refresh itself; an upstream failure is recorded as data, not
    /// propagated, and the gate is released in both branches.
    pub async fn fetch(&self) -> Option<LoadStatus> {
        if !self.update_required().await {
            return self.status().await;
        }
        if !self.gate.try_acquire().await {
            self.gate.wait().await;
            return self.status().await;
        }

        debug!("refreshing vehicle locations from upstream");
        let status = match self.provider.vehicle_locations().await {
            Ok(batch) => {
                let status = SuccessStatus {
                    last_update: batch.last_update,
                    timestamp: now_millis(),
                };
                self.dataset.lock().await.upsert(batch);
                LoadStatus::Success(status)
            }
            Err(error) => {
                warn!(%error, "upstream vehicle fetch failed");
                LoadStatus::Error(ErrorStatus {
                    error: Arc::new(error),
                    timestamp: now_millis(),
                })
            }
        };
        *self.status.lock().await = Some(status.clone());
        self.gate.release().await;
        Some(status)
    }

    /// Like [`fetch`](Self::fetch), but an error status re-surfaces the
    /// carried upstream error and an absent status is reported as a
    /// programming-error signal.
    pub async fn fetch_success_or_throw(&self) -> Result<SuccessStatus, VehicleCacheError> {
        match self.fetch().await {
            Some(LoadStatus::Success(status)) => Ok(status),
            Some(LoadStatus::Error(status)) => Err(VehicleCacheError::Upstream(status.error)),
            None => Err(VehicleCacheError::NoStatus),
        }
    }

    /// Look up one vehicle by id, refreshing first when due.
    pub async fn vehicle(&self, id: &str) -> Result<VehicleLocation, VehicleCacheError> {
        self.fetch_success_or_throw().await?;
        self.dataset
            .lock()
            .await
            .vehicle_by_id(id, now_millis())
            .ok_or_else(|| VehicleCacheError::VehicleNotFound { id: id.to_string() })
    }

    /// Look up one vehicle via the trip index, refreshing first when due.
    pub async fn vehicle_by_trip(
        &self,
        trip_id: &str,
    ) -> Result<VehicleLocation, VehicleCacheError> {
        self.fetch_success_or_throw().await?;
        self.dataset
            .lock()
            .await
            .vehicle_by_trip_id(trip_id, now_millis())
            .ok_or_else(|| VehicleCacheError::TripNotFound {
                id: trip_id.to_string(),
            })
    }

    /// All fresh vehicles inside the box, updated at or after
    /// `updated_since`.
    ///
    /// The box is validated before anything else happens; an invalid range
    /// never triggers an upstream fetch.
    pub async fn vehicles(
        &self,
        left: f64,
        right: f64,
        top: f64,
        bottom: f64,
        updated_since: i64,
    ) -> Result<Vec<VehicleLocation>, VehicleCacheError> {
        let bounds = BoundingBox::new(left, right, top, bottom)?;
        self.fetch_success_or_throw().await?;
        Ok(self
            .dataset
            .lock()
            .await
            .vehicles_in_box(&bounds, updated_since, now_millis()))
    }

    /// Drop every expired record from the dataset.
    pub async fn purge_expired(&self) {
        self.dataset.lock().await.purge_expired(now_millis());
    }
}
