// Integration tests for the matching pipeline, run against in-memory
// adapters so every external collaborator is deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cni_matcher::core::{round_to_tenth, MatchEngine, MatchEngineError, MatchThresholds};
use cni_matcher::models::{
    Coordinates, DrivingDistance, MatchType, ProximityCandidate, ServiceLocation,
};
use cni_matcher::services::{DistanceSource, Geocoder, LocationStore, StoreError};
use cni_matcher::haversine_miles;

// Asheville, NC: the geography all fixtures live in.
const ORIGIN: Coordinates = Coordinates {
    lat: 35.5951,
    lng: -82.5515,
};
const ORIGIN_PAIR: (f64, f64) = (35.5951, -82.5515);

fn location(id: i64, zip: &str, coords: Option<(f64, f64)>) -> ServiceLocation {
    ServiceLocation {
        id,
        location_name: format!("Location {}", id),
        zip: zip.to_string(),
        state: Some("NC".to_string()),
        email: Some(format!("location{}@example.com", id)),
        cni_status: Some("Active".to_string()),
        source: Some("master".to_string()),
        latitude: coords.map(|(lat, _)| lat),
        longitude: coords.map(|(_, lng)| lng),
    }
}

struct InMemoryStore {
    locations: Vec<ServiceLocation>,
    exact_calls: AtomicUsize,
    fail_fetch: bool,
}

impl InMemoryStore {
    fn new(locations: Vec<ServiceLocation>) -> Self {
        Self {
            locations,
            exact_calls: AtomicUsize::new(0),
            fail_fetch: false,
        }
    }

    fn with_failing_fetch(locations: Vec<ServiceLocation>) -> Self {
        Self {
            locations,
            exact_calls: AtomicUsize::new(0),
            fail_fetch: true,
        }
    }
}

#[async_trait]
impl LocationStore for InMemoryStore {
    async fn find_exact(&self, zip: &str) -> Result<Option<ServiceLocation>, StoreError> {
        self.exact_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .locations
            .iter()
            .filter(|l| l.zip == zip)
            .min_by_key(|l| l.id)
            .cloned())
    }

    async fn list_with_coordinates(&self) -> Result<Vec<ProximityCandidate>, StoreError> {
        Ok(self
            .locations
            .iter()
            .filter_map(|l| {
                l.coordinates().map(|c| ProximityCandidate {
                    id: l.id,
                    location_name: l.location_name.clone(),
                    zip: l.zip.clone(),
                    latitude: c.lat,
                    longitude: c.lng,
                })
            })
            .collect())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<ServiceLocation>, StoreError> {
        if self.fail_fetch {
            return Ok(None);
        }
        Ok(self.locations.iter().find(|l| l.id == id).cloned())
    }
}

struct FixedGeocoder {
    coords: Option<Coordinates>,
    calls: AtomicUsize,
}

impl FixedGeocoder {
    fn returning(coords: Option<Coordinates>) -> Self {
        Self {
            coords,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, _zip: &str) -> Option<Coordinates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.coords
    }
}

/// Returns a scripted driving distance per candidate id; unknown ids are
/// reported unroutable.
struct ScriptedDistances {
    miles_by_id: HashMap<i64, f64>,
    calls: AtomicUsize,
}

impl ScriptedDistances {
    fn new(entries: &[(i64, f64)]) -> Self {
        Self {
            miles_by_id: entries.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> Self {
        Self::new(&[])
    }
}

#[async_trait]
impl DistanceSource for ScriptedDistances {
    async fn compute_distances(
        &self,
        _origin: Coordinates,
        destinations: &[ProximityCandidate],
    ) -> Vec<DrivingDistance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut results: Vec<DrivingDistance> = destinations
            .iter()
            .map(|candidate| {
                let miles = self
                    .miles_by_id
                    .get(&candidate.id)
                    .copied()
                    .unwrap_or(f64::INFINITY);
                DrivingDistance {
                    candidate: candidate.clone(),
                    distance_meters: miles * 1609.34,
                    distance_miles: miles,
                    distance_text: miles.is_finite().then(|| format!("{:.1} mi", miles)),
                    duration_text: miles.is_finite().then(|| "20 mins".to_string()),
                }
            })
            .collect();
        results.sort_by(|a, b| a.distance_miles.total_cmp(&b.distance_miles));
        results
    }
}

/// Simulates a total routing outage: every call returns nothing.
struct FailingDistances {
    calls: AtomicUsize,
}

impl FailingDistances {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DistanceSource for FailingDistances {
    async fn compute_distances(
        &self,
        _origin: Coordinates,
        _destinations: &[ProximityCandidate],
    ) -> Vec<DrivingDistance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    geocoder: Arc<FixedGeocoder>,
    engine: MatchEngine,
    pool: Vec<ProximityCandidate>,
}

async fn harness_with(
    store: InMemoryStore,
    geocoder: FixedGeocoder,
    distances: Arc<dyn DistanceSource>,
) -> Harness {
    let store = Arc::new(store);
    let geocoder = Arc::new(geocoder);
    let engine = MatchEngine::new(
        store.clone(),
        geocoder.clone(),
        distances,
        MatchThresholds::default(),
    );
    let pool = store.list_with_coordinates().await.unwrap();
    Harness {
        store,
        geocoder,
        engine,
        pool,
    }
}

// Candidate coordinates a handful of miles from the origin.
const CANDLER: (f64, f64) = (35.5379, -82.6954);
const ARDEN: (f64, f64) = (35.4668, -82.5432);
// Far western NC, ~70 straight-line miles out.
const ANDREWS: (f64, f64) = (35.1879, -83.8219);

#[tokio::test]
async fn test_exact_zip_yields_direct_match() {
    let h = harness_with(
        InMemoryStore::new(vec![location(7, "28801", Some(ORIGIN_PAIR))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::Direct);
    assert_eq!(result.matched_cni_id, Some(7));
    assert_eq!(result.distance_miles, Some(0.0));
    // A direct hit never needs geocoding.
    assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_duplicate_zips_resolve_to_lowest_id() {
    let h = harness_with(
        InMemoryStore::new(vec![
            location(9, "28801", Some(ORIGIN_PAIR)),
            location(3, "28801", Some(ORIGIN_PAIR)),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    let first = h.engine.match_lead("28801", &h.pool).await.unwrap();
    let second = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(first.matched_cni_id, Some(3));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_short_zip_is_padded_before_lookup() {
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "00801", Some((18.34, -64.93)))]),
        FixedGeocoder::returning(None),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    let result = h.engine.match_lead("801", &h.pool).await.unwrap();
    assert_eq!(result.match_type, MatchType::Direct);
    assert_eq!(result.matched_zip.as_deref(), Some("00801"));
}

#[tokio::test]
async fn test_invalid_zip_rejected_without_io() {
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28801", Some(ORIGIN_PAIR))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    for bad in ["12a45", "123456", "", "  "] {
        let result = h.engine.match_lead(bad, &h.pool).await.unwrap();
        assert_eq!(result.match_type, MatchType::InvalidLeadZip, "input {:?}", bad);
        assert!(result.matched_cni_id.is_none());
        assert!(result.distance_miles.is_none());
    }

    // Rejected before any store or provider traffic.
    assert_eq!(h.store.exact_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_pool_reports_no_cni_data() {
    // The only registry row has no coordinates, so the pool is empty.
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28715", None)]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    assert!(h.pool.is_empty());
    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::NoCniData);
    // The pool check precedes geocoding, so no provider call is spent.
    assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_geocode_failure_stops_before_distance_call() {
    let distances = Arc::new(FailingDistances::new());
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28715", Some(CANDLER))]),
        FixedGeocoder::returning(None),
        distances.clone(),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::GeocodeFailed);
    assert!(result.matched_cni_id.is_none());
    assert!(result.distance_miles.is_none());
    assert!(result.distance_text.is_none());
    assert_eq!(distances.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_prefix_match_when_first_digits_differ() {
    let distances = Arc::new(FailingDistances::new());
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "90210", Some((34.09, -118.41))),
            location(2, "97201", Some((45.51, -122.69))),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        distances.clone(),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::NoPrefixMatch);
    assert_eq!(distances.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_nearby_cnis_beyond_straight_line_radius() {
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28901", Some(ANDREWS))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 5.0)])),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();
    assert_eq!(result.match_type, MatchType::NoNearbyCnis);
}

#[tokio::test]
async fn test_driving_threshold_is_inclusive() {
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28715", Some(CANDLER))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 15.0)])),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::WithinThreshold);
    assert_eq!(result.matched_cni_id, Some(1));
    assert_eq!(result.distance_miles, Some(15.0));
}

#[tokio::test]
async fn test_just_beyond_threshold_is_closest_driving() {
    let h = harness_with(
        InMemoryStore::new(vec![location(1, "28715", Some(CANDLER))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 15.1)])),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::ClosestDriving);
    assert_eq!(result.distance_miles, Some(15.1));
}

#[tokio::test]
async fn test_nearest_drivable_candidate_wins_and_is_rehydrated() {
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "28715", Some(CANDLER)),
            location(2, "28704", Some(ARDEN)),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 12.0), (2, 4.2)])),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::WithinThreshold);
    assert_eq!(result.matched_cni_id, Some(2));
    assert_eq!(result.distance_miles, Some(4.2));
    // Display fields come from the registry re-fetch, not the slim candidate.
    assert_eq!(result.state.as_deref(), Some("NC"));
    assert_eq!(result.email.as_deref(), Some("location2@example.com"));
}

#[tokio::test]
async fn test_unroutable_nearer_candidate_loses_to_routable_one() {
    // Candidate 2 is nearer by straight line but the provider cannot route
    // it; the routable candidate must win.
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "28715", Some(CANDLER)),
            location(2, "28704", Some(ARDEN)),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 10.0)])),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(result.match_type, MatchType::WithinThreshold);
    assert_eq!(result.matched_cni_id, Some(1));
}

#[tokio::test]
async fn test_routing_outage_falls_back_to_straight_line() {
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "28715", Some(CANDLER)),
            location(2, "28704", Some(ARDEN)),
            location(3, "28806", Some((35.6085, -82.6061))),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(FailingDistances::new()),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();

    // Nearest of the three by straight-line distance.
    let expected_nearest = [(1i64, CANDLER), (2, ARDEN), (3, (35.6085, -82.6061))]
        .iter()
        .map(|(id, (lat, lng))| (*id, haversine_miles(ORIGIN.lat, ORIGIN.lng, *lat, *lng)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();

    assert_eq!(result.match_type, MatchType::NoDrivingDistance);
    assert_eq!(result.matched_cni_id, Some(expected_nearest.0));
    assert_eq!(result.distance_miles, Some(round_to_tenth(expected_nearest.1)));
    assert_eq!(
        result.distance_text.as_deref(),
        Some(format!("~{:.1} mi (straight)", round_to_tenth(expected_nearest.1)).as_str())
    );
    assert!(result.duration_text.is_none());
}

#[tokio::test]
async fn test_all_elements_unroutable_falls_back_to_straight_line() {
    // The provider answers but marks every destination unroutable.
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "28715", Some(CANDLER)),
            location(2, "28704", Some(ARDEN)),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::unavailable()),
    )
    .await;

    let result = h.engine.match_lead("28801", &h.pool).await.unwrap();
    assert_eq!(result.match_type, MatchType::NoDrivingDistance);
}

#[tokio::test]
async fn test_rehydration_failure_is_fatal() {
    let h = harness_with(
        InMemoryStore::with_failing_fetch(vec![location(1, "28715", Some(CANDLER))]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 8.0)])),
    )
    .await;

    let error = h.engine.match_lead("28801", &h.pool).await.unwrap_err();
    assert!(matches!(
        error,
        MatchEngineError::MissingLocation { id: 1 }
    ));
}

#[tokio::test]
async fn test_match_is_idempotent_for_frozen_inputs() {
    let h = harness_with(
        InMemoryStore::new(vec![
            location(1, "28715", Some(CANDLER)),
            location(2, "28704", Some(ARDEN)),
        ]),
        FixedGeocoder::returning(Some(ORIGIN)),
        Arc::new(ScriptedDistances::new(&[(1, 9.3), (2, 11.8)])),
    )
    .await;

    let first = h.engine.match_lead("28801", &h.pool).await.unwrap();
    let second = h.engine.match_lead("28801", &h.pool).await.unwrap();

    assert_eq!(first, second);
}
