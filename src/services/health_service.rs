use tokio::time::Instant;
use tracing::warn;

use crate::{dto::health::HealthResponse, services::match_service, state::SharedState};

/// Report storage connectivity, the presentation link and open drafts.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match match_service::require_match_store(state).await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let presentation = state.presentation().status(Instant::now()).await;
    HealthResponse::new(
        state.is_degraded(),
        presentation.connected && !presentation.stale,
        state.open_draft_count(),
    )
}
