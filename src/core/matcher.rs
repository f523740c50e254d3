use std::sync::Arc;

use thiserror::Error;

use crate::core::filters::{filter_by_zip_prefix, normalize_zip, within_radius};
use crate::models::{MatchResult, MatchType, ProximityCandidate, ServiceLocation};
use crate::services::{DistanceSource, Geocoder, LocationStore, StoreError};

/// Distance thresholds governing proximity classification.
#[derive(Debug, Clone, Copy)]
pub struct MatchThresholds {
    /// Driving distance at or under this is classified `within_threshold`.
    pub driving_threshold_miles: f64,
    /// Straight-line radius for the candidate pre-filter (inclusive).
    pub straight_line_threshold_miles: f64,
    /// Leading ZIP digits a candidate must share with the lead.
    pub zip_prefix_length: usize,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            driving_threshold_miles: 15.0,
            straight_line_threshold_miles: 30.0,
            zip_prefix_length: 1,
        }
    }
}

/// Fatal errors from the matching pipeline.
///
/// Expected real-world failures (bad input, provider hiccups, empty
/// geography) are absorbed into [`MatchType`] and never surface here; these
/// variants signal registry inconsistency after a candidate was already
/// selected.
#[derive(Debug, Error)]
pub enum MatchEngineError {
    #[error("failed to load matched location {id}: {source}")]
    Store {
        id: i64,
        #[source]
        source: StoreError,
    },

    #[error("matched location {id} no longer exists in the registry")]
    MissingLocation { id: i64 },
}

/// Main matching orchestrator - implements the exact-match-first,
/// geographic-fallback pipeline
///
/// # Pipeline Stages
/// 1. ZIP normalization and validation
/// 2. Direct registry lookup
/// 3. Geocode the lead ZIP
/// 4. ZIP-prefix and straight-line candidate filtering
/// 5. Batched driving-distance lookup and classification
#[derive(Clone)]
pub struct MatchEngine {
    store: Arc<dyn LocationStore>,
    geocoder: Arc<dyn Geocoder>,
    distances: Arc<dyn DistanceSource>,
    thresholds: MatchThresholds,
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn LocationStore>,
        geocoder: Arc<dyn Geocoder>,
        distances: Arc<dyn DistanceSource>,
        thresholds: MatchThresholds,
    ) -> Self {
        Self {
            store,
            geocoder,
            distances,
            thresholds,
        }
    }

    /// Match one lead ZIP against the registry.
    ///
    /// `pool` is the coordinate-bearing candidate snapshot for the current
    /// run, fetched once by the caller and shared read-only across leads.
    /// Every step is a sequential, potentially suspending operation; there is
    /// no internal fan-out.
    pub async fn match_lead(
        &self,
        lead_zip: &str,
        pool: &[ProximityCandidate],
    ) -> Result<MatchResult, MatchEngineError> {
        let Some(zip) = normalize_zip(lead_zip) else {
            tracing::warn!("invalid lead ZIP provided: {:?}", lead_zip);
            return Ok(MatchResult::unmatched(MatchType::InvalidLeadZip));
        };

        // Direct registry hit ends the pipeline. A lookup failure here is
        // swallowed so the lead can still fall through to proximity search.
        match self.store.find_exact(&zip).await {
            Ok(Some(location)) => {
                tracing::debug!(
                    "direct match for {}: id {} ({})",
                    zip,
                    location.id,
                    location.location_name
                );
                return Ok(MatchResult::direct(&location));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "exact-match lookup failed for {}: {}; continuing with proximity search",
                    zip,
                    e
                );
            }
        }

        if pool.is_empty() {
            tracing::warn!("no coordinate-bearing locations available for {}", zip);
            return Ok(MatchResult::unmatched(MatchType::NoCniData));
        }

        let Some(origin) = self.geocoder.geocode(&zip).await else {
            tracing::warn!("geocode failed for lead ZIP {}", zip);
            return Ok(MatchResult::unmatched(MatchType::GeocodeFailed));
        };

        let prefixed = filter_by_zip_prefix(pool, &zip, self.thresholds.zip_prefix_length);
        tracing::debug!(
            "{} of {} candidates share the ZIP prefix of {}",
            prefixed.len(),
            pool.len(),
            zip
        );
        if prefixed.is_empty() {
            return Ok(MatchResult::unmatched(MatchType::NoPrefixMatch));
        }

        let mut nearby = within_radius(
            prefixed,
            origin,
            self.thresholds.straight_line_threshold_miles,
        );
        tracing::debug!(
            "{} candidates within {} straight-line miles of {}",
            nearby.len(),
            self.thresholds.straight_line_threshold_miles,
            zip
        );
        if nearby.is_empty() {
            return Ok(MatchResult::unmatched(MatchType::NoNearbyCnis));
        }

        // Pre-sort by straight-line distance. This ordering doubles as the
        // fallback ranking when routing yields nothing usable.
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));

        let candidates: Vec<ProximityCandidate> =
            nearby.iter().map(|(candidate, _)| candidate.clone()).collect();
        let routed = self.distances.compute_distances(origin, &candidates).await;

        match routed.first().filter(|entry| entry.is_routable()) {
            Some(best) => {
                let location = self.rehydrate(best.candidate.id).await?;
                let match_type = if best.distance_miles <= self.thresholds.driving_threshold_miles
                {
                    MatchType::WithinThreshold
                } else {
                    MatchType::ClosestDriving
                };
                tracing::debug!(
                    "closest driving match for {}: id {} at {:.1} miles ({})",
                    zip,
                    location.id,
                    best.distance_miles,
                    match_type
                );
                Ok(MatchResult::driving(
                    &location,
                    match_type,
                    best.distance_miles,
                    best.distance_text.clone(),
                    best.duration_text.clone(),
                ))
            }
            None => {
                // No usable driving routes; fall back to the nearest
                // candidate by straight-line distance.
                let (fallback, miles) = &nearby[0];
                tracing::warn!(
                    "no usable driving routes for {}; assigning id {} at ~{:.1} straight-line miles",
                    zip,
                    fallback.id,
                    miles
                );
                let location = self.rehydrate(fallback.id).await?;
                Ok(MatchResult::straight_line(&location, *miles))
            }
        }
    }

    /// Re-fetch full display fields for a selected candidate. Failure at this
    /// point means the registry mutated mid-operation and is fatal.
    async fn rehydrate(&self, id: i64) -> Result<ServiceLocation, MatchEngineError> {
        match self.store.fetch_by_id(id).await {
            Ok(Some(location)) => Ok(location),
            Ok(None) => Err(MatchEngineError::MissingLocation { id }),
            Err(source) => Err(MatchEngineError::Store { id, source }),
        }
    }
}
