use serde::{Deserialize, Serialize};

use crate::core::distance::round_to_tenth;

/// An inbound lead awaiting assignment. Identified by ZIP; name and id are
/// carried for display only and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub zip: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Geographic point in the shape the geocoding provider returns it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Full registry row for a partner service location (CNI).
///
/// Latitude and longitude are either both present or both absent. A location
/// without coordinates can still win an exact ZIP match but never enters
/// proximity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub id: i64,
    pub location_name: String,
    pub zip: String,
    pub state: Option<String>,
    pub email: Option<String>,
    pub cni_status: Option<String>,
    pub source: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ServiceLocation {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// Slim projection of a coordinate-bearing location, held for a whole batch
/// run. Full display fields are re-fetched by id once a candidate is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityCandidate {
    pub id: i64,
    pub location_name: String,
    pub zip: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One routed destination from the distance-matrix provider.
///
/// Entries for destinations the provider could not route carry infinite
/// distance so they sort behind every usable route.
#[derive(Debug, Clone)]
pub struct DrivingDistance {
    pub candidate: ProximityCandidate,
    pub distance_meters: f64,
    pub distance_miles: f64,
    pub distance_text: Option<String>,
    pub duration_text: Option<String>,
}

impl DrivingDistance {
    pub fn is_routable(&self) -> bool {
        self.distance_miles.is_finite()
    }
}

/// Terminal classification of one match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Exact ZIP hit in the registry.
    Direct,
    /// Lead ZIP was not a 5-digit number.
    InvalidLeadZip,
    /// No coordinate-bearing registry data available at all.
    NoCniData,
    /// Provider could not geocode the lead ZIP.
    GeocodeFailed,
    /// No candidate shares the lead's ZIP prefix.
    NoPrefixMatch,
    /// No candidate within the straight-line radius.
    NoNearbyCnis,
    /// Nearest drivable candidate at or under the driving threshold.
    WithinThreshold,
    /// Nearest drivable candidate beyond the driving threshold.
    ClosestDriving,
    /// Routing unavailable; matched by straight-line fallback.
    NoDrivingDistance,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Direct => "direct",
            MatchType::InvalidLeadZip => "invalid_lead_zip",
            MatchType::NoCniData => "no_cni_data",
            MatchType::GeocodeFailed => "geocode_failed",
            MatchType::NoPrefixMatch => "no_prefix_match",
            MatchType::NoNearbyCnis => "no_nearby_cnis",
            MatchType::WithinThreshold => "within_threshold",
            MatchType::ClosestDriving => "closest_driving",
            MatchType::NoDrivingDistance => "no_driving_distance",
        }
    }

    /// True when a location was assigned, regardless of how it was found.
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            MatchType::Direct
                | MatchType::WithinThreshold
                | MatchType::ClosestDriving
                | MatchType::NoDrivingDistance
        )
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of matching one lead. Computed per request, never cached.
///
/// `match_type` alone determines which other fields may be non-null: the
/// no-match classes carry nulls everywhere, `direct` carries distance 0, and
/// the proximity classes carry the matched location's denormalized fields
/// plus distance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "matchedCniId")]
    pub matched_cni_id: Option<i64>,
    #[serde(rename = "locationName")]
    pub location_name: Option<String>,
    #[serde(rename = "matchedZip")]
    pub matched_zip: Option<String>,
    pub state: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "cniStatus")]
    pub cni_status: Option<String>,
    pub source: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "matchType")]
    pub match_type: MatchType,
    #[serde(rename = "distanceMiles")]
    pub distance_miles: Option<f64>,
    #[serde(rename = "distanceText")]
    pub distance_text: Option<String>,
    #[serde(rename = "durationText")]
    pub duration_text: Option<String>,
}

impl MatchResult {
    /// A terminal no-match result: every location and distance field is null.
    pub fn unmatched(match_type: MatchType) -> Self {
        Self {
            matched_cni_id: None,
            location_name: None,
            matched_zip: None,
            state: None,
            email: None,
            cni_status: None,
            source: None,
            latitude: None,
            longitude: None,
            match_type,
            distance_miles: None,
            distance_text: None,
            duration_text: None,
        }
    }

    /// Exact ZIP hit: distance is zero by definition.
    pub fn direct(location: &ServiceLocation) -> Self {
        Self {
            distance_miles: Some(0.0),
            distance_text: Some("0 mi".to_string()),
            ..Self::with_location(location, MatchType::Direct)
        }
    }

    /// Proximity match backed by a routed driving distance.
    pub fn driving(
        location: &ServiceLocation,
        match_type: MatchType,
        miles: f64,
        distance_text: Option<String>,
        duration_text: Option<String>,
    ) -> Self {
        Self {
            distance_miles: Some(round_to_tenth(miles)),
            distance_text,
            duration_text,
            ..Self::with_location(location, match_type)
        }
    }

    /// Straight-line fallback when routing yielded no usable entries. The
    /// distance label is synthesized since the provider supplied none.
    pub fn straight_line(location: &ServiceLocation, miles: f64) -> Self {
        let rounded = round_to_tenth(miles);
        Self {
            distance_miles: Some(rounded),
            distance_text: Some(format!("~{:.1} mi (straight)", rounded)),
            ..Self::with_location(location, MatchType::NoDrivingDistance)
        }
    }

    fn with_location(location: &ServiceLocation, match_type: MatchType) -> Self {
        Self {
            matched_cni_id: Some(location.id),
            location_name: Some(location.location_name.clone()),
            matched_zip: Some(location.zip.clone()),
            state: location.state.clone(),
            email: location.email.clone(),
            cni_status: location.cni_status.clone(),
            source: location.source.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            match_type,
            distance_miles: None,
            distance_text: None,
            duration_text: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_location() -> ServiceLocation {
        ServiceLocation {
            id: 7,
            location_name: "Asheville Service Center".to_string(),
            zip: "28801".to_string(),
            state: Some("NC".to_string()),
            email: Some("asheville@example.com".to_string()),
            cni_status: Some("Active".to_string()),
            source: Some("master".to_string()),
            latitude: Some(35.5951),
            longitude: Some(-82.5515),
        }
    }

    #[test]
    fn test_match_type_serializes_snake_case() {
        let json = serde_json::to_string(&MatchType::WithinThreshold).unwrap();
        assert_eq!(json, "\"within_threshold\"");
        assert_eq!(MatchType::NoDrivingDistance.as_str(), "no_driving_distance");
    }

    #[test]
    fn test_unmatched_carries_only_match_type() {
        let result = MatchResult::unmatched(MatchType::GeocodeFailed);
        assert_eq!(result.match_type, MatchType::GeocodeFailed);
        assert!(result.matched_cni_id.is_none());
        assert!(result.distance_miles.is_none());
        assert!(result.distance_text.is_none());
    }

    #[test]
    fn test_direct_match_has_zero_distance() {
        let result = MatchResult::direct(&sample_location());
        assert_eq!(result.match_type, MatchType::Direct);
        assert_eq!(result.matched_cni_id, Some(7));
        assert_eq!(result.distance_miles, Some(0.0));
        assert_eq!(result.matched_zip.as_deref(), Some("28801"));
    }

    #[test]
    fn test_straight_line_synthesizes_label() {
        let result = MatchResult::straight_line(&sample_location(), 12.34);
        assert_eq!(result.match_type, MatchType::NoDrivingDistance);
        assert_eq!(result.distance_miles, Some(12.3));
        assert_eq!(result.distance_text.as_deref(), Some("~12.3 mi (straight)"));
        assert!(result.duration_text.is_none());
    }

    #[test]
    fn test_coordinates_require_both_fields() {
        let mut location = sample_location();
        assert!(location.coordinates().is_some());
        location.longitude = None;
        assert!(location.coordinates().is_none());
    }
}
