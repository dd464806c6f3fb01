//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `devices` - BLE device identity resolution
//! - `events` - Lock/unlock event log
//! - `health` - Service health and store status
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod devices;
pub mod error;
pub mod events;
pub mod health;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                       - Health check and store status
/// /docs                         - Swagger UI
/// /api
/// ├── /devices/{identifier}     - Resolve a BLE identifier
/// ├── /events                   - First event of a day (?day=yyyyMMdd)
/// ├── /events/unlock            - Record an unlock (POST)
/// ├── /events/lock              - Record a lock (POST)
/// └── /openapi.json             - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/devices", devices::router())
                .nest("/events", events::router()),
        )
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bleunlock_core::{create_log_store, Config, EventRecord, LockKind};
    use rusqlite::Connection;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppState;

    const IPHONE: &str = "6B1F3C52-4E0A-4D55-9C7E-0E2B1D9A7F10";

    fn seed_catalogs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let paired = dir.join("paired.db");
        Connection::open(&paired)
            .unwrap()
            .execute_batch(&format!(
                "CREATE TABLE PairedDevices (Uuid TEXT, Name TEXT, Address TEXT, ResolvedAddress TEXT);
                 INSERT INTO PairedDevices VALUES ('{IPHONE}', 'iPhone', 'Random 7E:11:22:33:44:55', 'Public AA:BB:CC:DD:EE:FF');"
            ))
            .unwrap();
        let other = dir.join("other.db");
        Connection::open(&other)
            .unwrap()
            .execute_batch("CREATE TABLE OtherDevices (Uuid TEXT, Name TEXT, Address TEXT);")
            .unwrap();
        (paired, other)
    }

    /// Router over fixture stores in `dir`, with the log provisioned when asked.
    fn test_router(dir: &TempDir, provision_log: bool) -> Router {
        let (paired, other) = seed_catalogs(dir.path());
        let mut config = Config::default();
        config.devices.paired_db = paired;
        config.devices.other_db = other;
        config.event_log.path = dir.path().join("TimeLog.db");
        config.event_log.timezone = Some("UTC".to_string());
        if provision_log {
            create_log_store(&config.event_log.path).unwrap();
        }
        create_router(AppState::from_config(config).unwrap().shared())
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_resolve_known_device() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, body) = send(&router, "GET", &format!("/api/devices/{IPHONE}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "iPhone");
        assert_eq!(body["mac_address"], "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn test_resolve_unknown_device() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, body) = send(&router, "GET", "/api/devices/not-a-device").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "device_not_found");
    }

    #[tokio::test]
    async fn test_record_then_lookup_today() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, recorded) = send(&router, "POST", "/api/events/unlock").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(recorded["recorded"], true);
        assert_eq!(recorded["kind"], "unlock");

        let day = recorded["day_key"].as_str().unwrap().to_string();
        let (status, body) = send(&router, "GET", &format!("/api/events?day={day}")).await;
        assert_eq!(status, StatusCode::OK);
        let record: EventRecord = serde_json::from_value(body).unwrap();
        assert_eq!(record.kind, Some(LockKind::Unlock));
        assert_eq!(record.day_key, day);
        assert_eq!(
            record.timestamp_label.as_deref(),
            recorded["timestamp_label"].as_str()
        );
    }

    #[tokio::test]
    async fn test_lock_event_recorded() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, recorded) = send(&router, "POST", "/api/events/lock").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(recorded["kind"], "lock");

        let count: i64 = Connection::open(dir.path().join("TimeLog.db"))
            .unwrap()
            .query_row("SELECT COUNT(*) FROM Log WHERE LockType = 'lock'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_lookup_other_day_not_found() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);
        send(&router, "POST", "/api/events/unlock").await;

        let (status, body) = send(&router, "GET", "/api/events?day=19700101").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "event_not_found");
    }

    #[tokio::test]
    async fn test_lookup_rejects_malformed_day() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, body) = send(&router, "GET", "/api/events?day=2025-01-15").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_day_key");
    }

    #[tokio::test]
    async fn test_missing_log_is_best_effort() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, false);

        let (status, recorded) = send(&router, "POST", "/api/events/unlock").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(recorded["recorded"], false);

        let (status, _) = send(&router, "GET", "/api/events").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!dir.path().join("TimeLog.db").exists());
    }

    #[tokio::test]
    async fn test_log_without_table_reports_not_recorded() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, false);
        Connection::open(dir.path().join("TimeLog.db")).unwrap();

        let (status, recorded) = send(&router, "POST", "/api/events/unlock").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(recorded["recorded"], false);

        let (_, body) = send(&router, "GET", "/health").await;
        assert_eq!(body["stores"]["event_log"], "ready");
    }

    #[tokio::test]
    async fn test_health_reports_store_states() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, false);

        let (status, body) = send(&router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stores"]["paired"], "uninitialized");

        send(&router, "GET", &format!("/api/devices/{IPHONE}")).await;
        send(&router, "GET", "/api/events").await;

        let (_, body) = send(&router, "GET", "/health").await;
        assert_eq!(body["stores"]["paired"], "ready");
        assert_eq!(body["stores"]["other"], "ready");
        assert_eq!(body["stores"]["event_log"], "unavailable");
    }

    #[tokio::test]
    async fn test_openapi_route() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, true);

        let (status, body) = send(&router, "GET", "/api/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "bleunlock API");
    }
}
