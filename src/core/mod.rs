// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod matcher;

pub use distance::{haversine_miles, meters_to_miles, round_to_tenth};
pub use filters::{filter_by_zip_prefix, normalize_zip, within_radius};
pub use matcher::{MatchEngine, MatchEngineError, MatchThresholds};
