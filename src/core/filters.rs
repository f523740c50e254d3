use crate::core::distance::haversine_miles;
use crate::models::{Coordinates, ProximityCandidate};

/// Normalize a raw ZIP into canonical 5-digit form.
///
/// Trims whitespace, rejects anything non-numeric, and zero-pads short values
/// ("801" becomes "00801"). Inputs longer than five digits are rejected rather
/// than truncated.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 5 {
        return None;
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>5}", trimmed))
}

/// Coarse geographic pre-filter: keep candidates whose ZIP shares the lead's
/// first `prefix_len` digits. Trades a small risk of excluding a true nearest
/// neighbor across a prefix boundary for a much smaller pool ahead of the
/// expensive distance step.
pub fn filter_by_zip_prefix(
    pool: &[ProximityCandidate],
    lead_zip: &str,
    prefix_len: usize,
) -> Vec<ProximityCandidate> {
    let prefix = &lead_zip[..prefix_len.min(lead_zip.len())];
    pool.iter()
        .filter(|candidate| candidate.zip.starts_with(prefix))
        .cloned()
        .collect()
}

/// Keep candidates within `max_miles` straight-line distance of the origin
/// (inclusive), pairing each survivor with its computed distance so callers
/// can pre-sort without recomputing.
pub fn within_radius(
    candidates: Vec<ProximityCandidate>,
    origin: Coordinates,
    max_miles: f64,
) -> Vec<(ProximityCandidate, f64)> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let miles = haversine_miles(
                origin.lat,
                origin.lng,
                candidate.latitude,
                candidate.longitude,
            );
            (miles <= max_miles).then_some((candidate, miles))
        })
        .collect()
}
