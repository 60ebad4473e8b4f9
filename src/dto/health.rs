use serde::Serialize;
use utoipa::ToSchema;

/// Health summary returned by the `/healthcheck` route.
///
/// The handler probes the storage backend on every request, so the payload
/// reflects reachability at the time of the call rather than a cached flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the storage backend answered the liveness probe.
    pub storage_reachable: bool,
}

impl HealthResponse {
    /// Report a reachable storage backend.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage_reachable: true,
        }
    }

    /// Report that storage is missing or unreachable.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            storage_reachable: false,
        }
    }
}
