use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness plus whether the storage backend is reachable right now.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let healthy = match state.game_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    if healthy {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}
