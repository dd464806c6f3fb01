//! Device identity API endpoint.
//!
//! Maps a BLE identifier handed out by the platform Bluetooth API to the
//! name and MAC address recorded by the OS Bluetooth stack.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use bleunlock_core::{BleUnlockError, DeviceIdentity};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the devices router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/{identifier}", get(resolve_device))
}

/// Resolve a BLE identifier to its display identity.
///
/// The paired-devices catalog is consulted first, the other-devices catalog
/// only when the paired one has no row.
#[utoipa::path(
    get,
    path = "/api/devices/{identifier}",
    tag = "devices",
    operation_id = "resolveDevice",
    summary = "Resolve a device identifier",
    description = "Looks the identifier up in the paired devices catalog, then \
        in the other devices catalog. A known device may still have no name or \
        MAC address.",
    params(
        ("identifier" = String, Path, description = "Identifier reported by the platform Bluetooth API",
            example = "6B1F3C52-4E0A-4D55-9C7E-0E2B1D9A7F10")
    ),
    responses(
        (status = 200, description = "Device is known", body = DeviceIdentity),
        (status = 404, description = "Device is in neither catalog", body = crate::api::ErrorResponse)
    )
)]
pub async fn resolve_device(
    State(state): State<SharedState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<DeviceIdentity>> {
    let lookup = identifier.clone();
    let resolved = tokio::task::spawn_blocking(move || state.resolver.resolve(&lookup))
        .await
        .map_err(|e| ApiError::task_failed(&e))?;

    resolved
        .map(Json)
        .ok_or_else(|| BleUnlockError::DeviceNotFound(identifier).into())
}
