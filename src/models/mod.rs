// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Coordinates, DrivingDistance, Lead, MatchResult, MatchType, ProximityCandidate,
    ServiceLocation,
};
pub use requests::SingleLookupRequest;
pub use responses::{ErrorResponse, HealthResponse, MatchedLead, SingleLookupResponse};
