use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether an external presentation display is attached.
    pub presentation_connected: bool,
    /// Number of open draft sessions.
    pub open_drafts: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag and live counters.
    pub fn new(degraded: bool, presentation_connected: bool, open_drafts: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            presentation_connected,
            open_drafts,
        }
    }
}
