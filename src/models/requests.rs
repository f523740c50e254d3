use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to match a single lead ZIP against the registry.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SingleLookupRequest {
    #[validate(length(min = 1))]
    pub zip: String,
    #[serde(default)]
    #[serde(alias = "lead_name", rename = "leadName")]
    pub lead_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "lead_id", rename = "leadId")]
    pub lead_id: Option<String>,
}
