//! OpenAPI specification generation for the bleunlock API.
//!
//! Served at `/api/openapi.json`, browsable through Swagger UI at `/docs`, and
//! written to disk by the `gen-openapi` binary.

use axum::Json;
use bleunlock_core::{DeviceIdentity, EventRecord, LockKind, StoreState};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::events::RecordEventResponse;
use super::health::{HealthResponse, StoreHealth};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a pretty-printed string.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> serde_json::Result<String> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for bleunlock.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bleunlock API",
        version = "0.1.0",
        description = r#"
# bleunlock API

bleunlock locks your computer when your phone walks away and unlocks it when
the phone comes back.

## Overview

This API exposes two fixed access patterns:

1. **Device identity**: turn the unstable identifier reported by the platform
   Bluetooth API into the device's name and MAC address, using the catalogs
   kept by the OS Bluetooth stack.
2. **Event log**: record lock and unlock events and look up the first event
   of a given day.

Both are best-effort. A missing store never fails a request: lookups come
back empty and recordings are accepted and dropped.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local bleunlock server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks and store status"
        ),
        (
            name = "devices",
            description = "BLE device identity resolution"
        ),
        (
            name = "events",
            description = "Lock/unlock event log"
        )
    ),
    paths(
        super::health::health_check,
        super::devices::resolve_device,
        super::events::record_unlock,
        super::events::record_lock,
        super::events::lookup_event,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            StoreHealth,
            StoreState,
            DeviceIdentity,
            EventRecord,
            LockKind,
            RecordEventResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "bleunlock API");
        assert!(spec.paths.paths.contains_key("/api/devices/{identifier}"));
        assert!(spec.paths.paths.contains_key("/api/events"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"bleunlock API\""));
        assert!(json.contains("recordUnlock"));
    }
}
