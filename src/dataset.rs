//! In-memory indexed vehicle dataset.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::VehicleCacheError;
use crate::models::{VehicleLocation, VehicleLocationBatch};

/// Validated bounding box for spatial queries.
///
/// Constructing one is the single place range parameters are checked, so an
/// invalid range can never reach the dataset or trigger an upstream fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl BoundingBox {
    /// Build a box from inclusive edges.
    ///
    /// Fails when `left >= right` or `top <= bottom`.
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Result<Self, VehicleCacheError> {
        if left >= right {
            return Err(VehicleCacheError::InvalidBoundingBox {
                message: "left must be smaller than right".to_string(),
            });
        }
        if top <= bottom {
            return Err(VehicleCacheError::InvalidBoundingBox {
                message: "top must be greater than bottom".to_string(),
            });
        }
        Ok(Self {
            left,
            right,
            top,
            bottom,
        })
    }

    /// Whether a record's position lies inside the box, all edges inclusive.
    ///
    /// Records with a partially known position never match.
    fn contains(&self, vehicle: &VehicleLocation) -> bool {
        let (Some(latitude), Some(longitude)) = (vehicle.latitude, vehicle.longitude) else {
            return false;
        };
        longitude >= self.left
            && longitude <= self.right
            && latitude >= self.bottom
            && latitude <= self.top
    }
}

/// Vehicle records indexed by id and by trip id, with lazy TTL expiry.
///
/// Records are only ever written by the refresh coordinator; reads filter
/// out entries older than the TTL instead of purging them eagerly. A record
/// whose `last_update` sits exactly at the TTL boundary is still valid.
#[derive(Debug)]
pub struct VehicleDataset {
    ttl_millis: i64,
    by_id: IndexMap<String, VehicleLocation>,
    /// Secondary index, trip id -> vehicle id. Overwritten on every admitted
    /// upsert, so the most recently upserted record for a trip wins.
    by_trip: HashMap<String, String>,
}

impl VehicleDataset {
    /// Create a dataset whose reads reject records older than `ttl_millis`.
    pub fn new(ttl_millis: i64) -> Self {
        Self {
            ttl_millis,
            by_id: IndexMap::new(),
            by_trip: HashMap::new(),
        }
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn expired(&self, vehicle: &VehicleLocation, now: i64) -> bool {
        vehicle.last_update < now - self.ttl_millis
    }

    /// Filter and insert one upstream batch.
    ///
    /// Null slots, tombstones, entries without an id and entries missing
    /// both coordinates are discarded; survivors are stamped with the batch
    /// `last_update` and replace any previous record with the same id in
    /// both indices.
    pub fn upsert(&mut self, batch: VehicleLocationBatch) {
        let last_update = batch.last_update;
        let candidates = batch.vehicles.len();
        let mut admitted = 0usize;
        for entry in batch.vehicles.into_iter().flatten() {
            let Some(record) = entry.into_record(last_update) else {
                continue;
            };
            if let Some(trip_id) = &record.trip_id {
                self.by_trip.insert(trip_id.clone(), record.id.clone());
            }
            self.by_id.insert(record.id.clone(), record);
            admitted += 1;
        }
        debug!(candidates, admitted, "upserted vehicle batch");
    }

    /// Fetch a record by primary id.
    ///
    /// Unknown ids short-circuit before the expiry check.
    pub fn vehicle_by_id(&self, id: &str, now: i64) -> Option<VehicleLocation> {
        let vehicle = self.by_id.get(id)?;
        if self.expired(vehicle, now) {
            return None;
        }
        Some(vehicle.clone())
    }

    /// Fetch a record via the trip index.
    ///
    /// When several records share a trip id, the most recently upserted one
    /// wins. A stale mapping (the vehicle has since moved to another trip)
    /// reads as not found.
    pub fn vehicle_by_trip_id(&self, trip_id: &str, now: i64) -> Option<VehicleLocation> {
        let id = self.by_trip.get(trip_id)?;
        let vehicle = self.by_id.get(id)?;
        if vehicle.trip_id.as_deref() != Some(trip_id) {
            return None;
        }
        if self.expired(vehicle, now) {
            return None;
        }
        Some(vehicle.clone())
    }

    /// All non-expired records inside `bounds` updated at or after
    /// `updated_since`, in insertion order.
    pub fn vehicles_in_box(
        &self,
        bounds: &BoundingBox,
        updated_since: i64,
        now: i64,
    ) -> Vec<VehicleLocation> {
        self.by_id
            .values()
            .filter(|vehicle| !self.expired(vehicle, now))
            .filter(|vehicle| vehicle.last_update >= updated_since)
            .filter(|vehicle| bounds.contains(vehicle))
            .cloned()
            .collect()
    }

    /// Remove every expired record from both indices.
    pub fn purge_expired(&mut self, now: i64) {
        let cutoff = now - self.ttl_millis;
        self.by_id
            .retain(|_, vehicle| vehicle.last_update >= cutoff);
        let by_id = &self.by_id;
        self.by_trip.retain(|_, id| by_id.contains_key(id));
    }
}
