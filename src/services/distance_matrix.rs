use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::core::distance::meters_to_miles;
use crate::models::{Coordinates, DrivingDistance, ProximityCandidate};

/// Provider hard limit on destinations per distance-matrix request.
pub const MAX_DESTINATIONS_PER_REQUEST: usize = 25;

const DISTANCE_MATRIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Translates an origin plus destination list into per-destination route
/// distances.
///
/// Implementations must return entries sorted ascending by distance with
/// unroutable entries last, so callers can take the head as "nearest
/// routable". Per-destination provider failures must not fail the whole call.
#[async_trait]
pub trait DistanceSource: Send + Sync {
    async fn compute_distances(
        &self,
        origin: Coordinates,
        destinations: &[ProximityCandidate],
    ) -> Vec<DrivingDistance>;
}

/// Google Maps Distance Matrix API client
///
/// Destinations are partitioned into batches of at most 25 and issued as
/// sequential requests. Results map back to destinations by positional index
/// within each batch, so batch ordering is preserved end-to-end.
pub struct GoogleDistanceMatrix {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GoogleDistanceMatrix {
    /// Create a new distance-matrix client. `base_url` is the full endpoint
    /// so tests can point it at a local mock server.
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = Client::builder()
            .timeout(DISTANCE_MATRIX_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// Issue one batch request and append its per-destination entries.
    ///
    /// A whole-batch failure (transport error, non-OK top-level status) drops
    /// the batch's entries entirely; a failed element is recorded with
    /// infinite distance so it sorts behind every usable route.
    async fn request_batch(
        &self,
        origin: Coordinates,
        batch: &[ProximityCandidate],
        results: &mut Vec<DrivingDistance>,
    ) {
        let destinations = batch
            .iter()
            .map(|candidate| format!("{},{}", candidate.latitude, candidate.longitude))
            .collect::<Vec<_>>()
            .join("|");

        let url = format!(
            "{}?origins={},{}&destinations={}&key={}&units=imperial",
            self.base_url,
            origin.lat,
            origin.lng,
            urlencoding::encode(&destinations),
            self.api_key
        );

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("distance matrix request failed: {}", e);
                return;
            }
        };

        let body: MatrixResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("malformed distance matrix response: {}", e);
                return;
            }
        };

        if body.status != "OK" {
            tracing::error!(
                "distance matrix error: status={} {}",
                body.status,
                body.error_message.as_deref().unwrap_or("")
            );
            return;
        }

        let elements = body
            .rows
            .into_iter()
            .next()
            .map(|row| row.elements)
            .unwrap_or_default();

        if elements.len() != batch.len() {
            tracing::warn!(
                "distance matrix returned {} elements for {} destinations",
                elements.len(),
                batch.len()
            );
        }

        for (element, candidate) in elements.into_iter().zip(batch.iter().cloned()) {
            match element {
                MatrixElement {
                    status,
                    distance: Some(distance),
                    duration,
                } if status == "OK" => {
                    results.push(DrivingDistance {
                        candidate,
                        distance_meters: distance.value,
                        distance_miles: meters_to_miles(distance.value),
                        distance_text: Some(distance.text),
                        duration_text: duration.map(|d| d.text),
                    });
                }
                element => {
                    tracing::warn!(
                        "distance element not usable for location {} (ZIP {}): {}",
                        candidate.id,
                        candidate.zip,
                        element.status
                    );
                    results.push(DrivingDistance {
                        candidate,
                        distance_meters: f64::INFINITY,
                        distance_miles: f64::INFINITY,
                        distance_text: None,
                        duration_text: None,
                    });
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<DistanceField>,
    duration: Option<DurationField>,
}

#[derive(Debug, Deserialize)]
struct DistanceField {
    /// Route distance in meters; the authoritative value.
    value: f64,
    /// Localized label for display only.
    text: String,
}

#[derive(Debug, Deserialize)]
struct DurationField {
    text: String,
}

#[async_trait]
impl DistanceSource for GoogleDistanceMatrix {
    async fn compute_distances(
        &self,
        origin: Coordinates,
        destinations: &[ProximityCandidate],
    ) -> Vec<DrivingDistance> {
        if destinations.is_empty() {
            return Vec::new();
        }

        tracing::debug!(
            "calculating driving distances for {} candidates",
            destinations.len()
        );

        let mut results = Vec::with_capacity(destinations.len());
        // Batches are issued one after another to respect provider rate limits.
        for batch in destinations.chunks(MAX_DESTINATIONS_PER_REQUEST) {
            self.request_batch(origin, batch, &mut results).await;
        }

        results.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

        tracing::debug!(
            "distance calculations finished: {} of {} routable",
            results.iter().filter(|r| r.is_routable()).count(),
            destinations.len()
        );

        results
    }
}
