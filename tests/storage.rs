//! End-to-end tests of the cache through its public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vehicle_cache::{
    CacheConfig, PositionType, TrapezeClient, UpstreamConfig, VehicleCacheError,
    VehicleLocationBatch, VehicleProvider, VehicleStorage,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

const VEHICLES_PATH: &str =
    "/internetservice/geoserviceDispatcher/services/vehicleinfo/vehicles";

fn upstream_body(last_update: i64) -> serde_json::Value {
    serde_json::json!({
        "lastUpdate": last_update,
        "vehicles": [
            {
                "id": "652",
                "tripId": "t-100",
                "latitude": 50.0614,
                "longitude": 19.9366,
                "name": "3 Nowy Bieżanów",
                "heading": 90
            },
            { "id": "653", "isDeleted": true },
            null,
            { "id": "654", "tripId": "t-101" }
        ]
    })
}

async fn mock_upstream(last_update: i64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VEHICLES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body(last_update)))
        .mount(&server)
        .await;
    server
}

fn storage_for(server: &MockServer) -> VehicleStorage<TrapezeClient> {
    let upstream = UpstreamConfig {
        endpoint: server.uri(),
        position_type: PositionType::Corrected,
        timeout: Duration::from_secs(5),
    };
    let client = TrapezeClient::new(&upstream).expect("client must build");
    VehicleStorage::with_config(client, &CacheConfig::default())
}

#[tokio::test]
async fn serves_vehicles_from_an_http_upstream() {
    init_tracing();
    let server = mock_upstream(1_700_000_000_000).await;
    let storage = storage_for(&server);

    let vehicle = storage.vehicle("652").await.unwrap();
    assert_eq!(vehicle.id, "652");
    assert_eq!(vehicle.trip_id.as_deref(), Some("t-100"));
    assert_eq!(vehicle.last_update, 1_700_000_000_000);
    assert_eq!(
        vehicle.extra.get("name").and_then(|v| v.as_str()),
        Some("3 Nowy Bieżanów")
    );

    // Tombstones and coordinate-less entries never entered the dataset.
    assert!(matches!(
        storage.vehicle("653").await.unwrap_err(),
        VehicleCacheError::VehicleNotFound { .. }
    ));
    assert!(matches!(
        storage.vehicle("654").await.unwrap_err(),
        VehicleCacheError::VehicleNotFound { .. }
    ));

    let by_trip = storage.vehicle_by_trip("t-100").await.unwrap();
    assert_eq!(by_trip.id, "652");

    let in_box = storage.vehicles(19.0, 20.0, 51.0, 49.0, 0).await.unwrap();
    assert_eq!(in_box.len(), 1);
    let in_box = storage
        .vehicles(19.0, 20.0, 51.0, 49.0, 1_700_000_000_001)
        .await
        .unwrap();
    assert!(in_box.is_empty());
}

#[tokio::test]
async fn repeated_queries_hit_upstream_once_within_the_interval() {
    init_tracing();
    let server = mock_upstream(7).await;
    let storage = storage_for(&server);

    for _ in 0..4 {
        storage.vehicle("652").await.unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn upstream_http_failure_reaches_the_caller() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let storage = storage_for(&server);

    let err = storage.vehicle("652").await.unwrap_err();
    let VehicleCacheError::Upstream(cause) = err else {
        panic!("expected the upstream error, got {err:?}");
    };
    assert!(matches!(&*cause, VehicleCacheError::Http(_)));
}

/// Provider that blocks until released, to pin the refresh in flight.
struct HeldProvider {
    calls: AtomicUsize,
    release: tokio::sync::Notify,
}

/// Newtype so the trait can be implemented for a shared handle without
/// tripping the orphan rule on `Arc`.
struct SharedHeldProvider(Arc<HeldProvider>);

#[async_trait]
impl VehicleProvider for SharedHeldProvider {
    async fn vehicle_locations(&self) -> Result<VehicleLocationBatch, VehicleCacheError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0.release.notified().await;
        Ok(VehicleLocationBatch {
            last_update: 99,
            vehicles: vec![Some(vehicle_cache::RawVehicleEntry {
                id: Some("a".to_string()),
                trip_id: Some("t1".to_string()),
                latitude: Some(1.0),
                longitude: Some(2.0),
                ..Default::default()
            })],
        })
    }
}

#[tokio::test]
async fn callers_arriving_mid_refresh_share_the_in_flight_request() {
    init_tracing();
    let provider = Arc::new(HeldProvider {
        calls: AtomicUsize::new(0),
        release: tokio::sync::Notify::new(),
    });
    let storage = Arc::new(VehicleStorage::new(
        SharedHeldProvider(provider.clone()),
        3_600_000,
        3_600_000,
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move { storage.vehicle("a").await }));
    }

    // Wait until the leader is inside the provider, everyone else queued.
    while provider.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    provider.release.notify_one();

    for handle in handles {
        let vehicle = handle.await.unwrap().unwrap();
        assert_eq!(vehicle.id, "a");
        assert_eq!(vehicle.last_update, 99);
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}
