use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    /// Human readable description of the failure
    pub message: String,
    /// The HTTP status code
    pub code: u16,
    /// Stable identifier of the failure kind, e.g. `BLOCKED` or `INVALID_STATE`
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
