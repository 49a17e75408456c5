//! Data models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One candidate entry from an upstream vehicle batch.
///
/// Everything is optional on the wire: the upstream is known to emit `null`
/// array slots, tombstones flagged `isDeleted`, and entries with partial or
/// missing coordinates. Fields this crate does not model are preserved
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawVehicleEntry {
    pub id: Option<String>,
    pub trip_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawVehicleEntry {
    /// Whether this entry may enter the dataset.
    ///
    /// Tombstones, entries without a primary key and entries lacking both
    /// coordinates are rejected.
    pub fn admissible(&self) -> bool {
        if self.is_deleted || self.id.is_none() {
            return false;
        }
        self.latitude.is_some() || self.longitude.is_some()
    }

    /// Convert into a dataset record stamped with the batch timestamp.
    ///
    /// Returns `None` for entries that fail the admission rule.
    pub fn into_record(self, last_update: i64) -> Option<VehicleLocation> {
        if !self.admissible() {
            return None;
        }
        Some(VehicleLocation {
            id: self.id?,
            trip_id: self.trip_id,
            latitude: self.latitude,
            longitude: self.longitude,
            last_update,
            extra: self.extra,
        })
    }
}

/// Batch returned by the upstream location endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLocationBatch {
    /// Timestamp the upstream declares for this batch, Unix milliseconds.
    pub last_update: i64,
    /// Candidate entries; `null` slots deserialize to `None`.
    #[serde(default)]
    pub vehicles: Vec<Option<RawVehicleEntry>>,
}

/// An admitted vehicle location record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLocation {
    pub id: String,
    pub trip_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Stamped from the batch that produced this record, Unix milliseconds.
    pub last_update: i64,
    /// Upstream fields carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> RawVehicleEntry {
        RawVehicleEntry {
            id: Some(id.to_string()),
            latitude: Some(1.0),
            longitude: Some(2.0),
            ..Default::default()
        }
    }

    #[test]
    fn parse_batch() {
        let s = r#"{
            "lastUpdate": 1700000000000,
            "vehicles": [
                { "id": "652", "tripId": "t1", "latitude": 50.06, "longitude": 19.94, "heading": 90 },
                null,
                { "id": "653", "isDeleted": true }
            ]
        }"#;
        let batch: VehicleLocationBatch = serde_json::from_str(s).unwrap();

        assert_eq!(batch.last_update, 1_700_000_000_000);
        assert_eq!(batch.vehicles.len(), 3);
        assert!(batch.vehicles[1].is_none());

        let first = batch.vehicles[0].as_ref().unwrap();
        assert_eq!(first.id.as_deref(), Some("652"));
        assert_eq!(first.trip_id.as_deref(), Some("t1"));
        assert_eq!(first.extra.get("heading"), Some(&Value::from(90)));

        let deleted = batch.vehicles[2].as_ref().unwrap();
        assert!(deleted.is_deleted);
        assert!(!deleted.admissible());
    }

    #[test]
    fn parse_batch_without_vehicles() {
        let batch: VehicleLocationBatch = serde_json::from_str(r#"{"lastUpdate": 5}"#).unwrap();
        assert_eq!(batch.last_update, 5);
        assert!(batch.vehicles.is_empty());
    }

    #[test]
    fn admission_rules() {
        assert!(entry("a").admissible());

        let deleted = RawVehicleEntry {
            is_deleted: true,
            ..entry("a")
        };
        assert!(!deleted.admissible());

        let keyless = RawVehicleEntry {
            id: None,
            ..entry("a")
        };
        assert!(!keyless.admissible());

        let no_position = RawVehicleEntry {
            latitude: None,
            longitude: None,
            ..entry("a")
        };
        assert!(!no_position.admissible());

        // A single known coordinate is enough to be admitted.
        let half_known = RawVehicleEntry {
            longitude: None,
            ..entry("a")
        };
        assert!(half_known.admissible());
    }

    #[test]
    fn into_record_stamps_batch_timestamp() {
        let record = entry("652").into_record(100).unwrap();
        assert_eq!(record.id, "652");
        assert_eq!(record.last_update, 100);

        let deleted = RawVehicleEntry {
            is_deleted: true,
            ..entry("652")
        };
        assert!(deleted.into_record(100).is_none());
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let mut raw = entry("652");
        raw.trip_id = Some("t1".to_string());
        raw.extra
            .insert("category".to_string(), Value::from("tram"));
        let record = raw.into_record(100).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tripId"], "t1");
        assert_eq!(json["lastUpdate"], 100);
        assert_eq!(json["category"], "tram");
    }
}
