use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::models::Coordinates;

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Translates a ZIP code into coordinates via an external provider.
///
/// The contract is best-effort: any non-success provider status, empty result
/// set, transport error, or timeout resolves to `None`. Expected failure
/// modes never surface as errors.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, zip: &str) -> Option<Coordinates>;
}

/// Google Maps Geocoding API client
pub struct GoogleGeocoder {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Create a new geocoding client. `base_url` is the full geocode endpoint
    /// so tests can point it at a local mock server.
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = Client::builder()
            .timeout(GEOCODE_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, zip: &str) -> Option<Coordinates> {
        // Reject malformed ZIPs before spending a network call.
        if zip.len() != 5 || !zip.bytes().all(|b| b.is_ascii_digit()) {
            tracing::warn!("invalid ZIP format for geocoding: {:?}", zip);
            return None;
        }

        let url = format!(
            "{}?address={}&key={}",
            self.base_url,
            urlencoding::encode(zip),
            self.api_key
        );

        tracing::debug!("geocoding lead ZIP {}", zip);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("geocode request failed for {}: {}", zip, e);
                return None;
            }
        };

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("malformed geocode response for {}: {}", zip, e);
                return None;
            }
        };

        if body.status != "OK" {
            tracing::warn!(
                "geocode failed for {}: status={} {}",
                zip,
                body.status,
                body.error_message.as_deref().unwrap_or("")
            );
            return None;
        }

        let location = body
            .results
            .into_iter()
            .next()
            .map(|result| result.geometry.location);

        if let Some(coords) = location {
            tracing::debug!("geocoded {} to lat={}, lng={}", zip, coords.lat, coords.lng);
        }

        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_response_parsing() {
        let json = r#"{
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 35.5951, "lng": -82.5515 } } }
            ]
        }"#;

        let body: GeocodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.status, "OK");
        assert_eq!(body.results[0].geometry.location.lat, 35.5951);
    }

    #[test]
    fn test_zero_results_parses_without_results_field() {
        let json = r#"{ "status": "ZERO_RESULTS" }"#;
        let body: GeocodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.status, "ZERO_RESULTS");
        assert!(body.results.is_empty());
    }
}
