use serde::{Deserialize, Serialize};

use crate::models::domain::MatchResult;

/// Response for the single lookup endpoint. Echoes the lead's display fields
/// alongside the full match result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleLookupResponse {
    pub success: bool,
    #[serde(rename = "match")]
    pub matched: MatchedLead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedLead {
    #[serde(rename = "leadName")]
    pub lead_name: String,
    #[serde(rename = "leadId")]
    pub lead_id: String,
    pub zip: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
