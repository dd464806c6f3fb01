//! Health check API endpoint.
//!
//! Reports service status and the lifecycle state of each store. Checking
//! health never opens a store.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use bleunlock_core::StoreState;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "uptime_secs": 3600,
    "stores": {
        "paired": "ready",
        "other": "ready",
        "event_log": "unavailable"
    }
}))]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Seconds since startup.
    #[schema(example = 3600)]
    pub uptime_secs: u64,

    /// State of each backing store.
    pub stores: StoreHealth,
}

/// Lifecycle state of each backing store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoreHealth {
    /// Paired-devices catalog.
    pub paired: StoreState,
    /// Other-devices catalog.
    pub other: StoreState,
    /// Lock/unlock event log.
    pub event_log: StoreState,
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
///
/// Always reports `ok`; unavailable stores are reported per store since the
/// service keeps answering (with empty results) without them.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns service status and the state of each store \
        (`uninitialized`, `ready` or `unavailable`).",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let catalogs = state.resolver.availability();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        stores: StoreHealth {
            paired: catalogs.paired,
            other: catalogs.other,
            event_log: state.event_log.state(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 5,
            stores: StoreHealth {
                paired: StoreState::Ready,
                other: StoreState::Uninitialized,
                event_log: StoreState::Unavailable,
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"event_log\":\"unavailable\""));
        assert!(json.contains("\"other\":\"uninitialized\""));
    }
}
