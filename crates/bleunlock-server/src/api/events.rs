//! Lock/unlock event log API endpoints.
//!
//! Recording is best-effort: a request to record an event is accepted even
//! when the log store is unavailable, and the response says whether a row
//! was written.

use std::sync::OnceLock;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bleunlock_core::{BleUnlockError, EventRecord, LockKind};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the events router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(lookup_event))
        .route("/unlock", post(record_unlock))
        .route("/lock", post(record_lock))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the event lookup endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EventLookupQuery {
    /// Day key in `yyyyMMdd` format. Defaults to today.
    #[param(example = "20250115")]
    pub day: Option<String>,
}

/// Response after recording an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "kind": "unlock",
    "day_key": "20250115",
    "timestamp_label": "20250115 07:30:00",
    "recorded_at_utc": "2025-01-15T07:30:00+00:00",
    "recorded": true
}))]
pub struct RecordEventResponse {
    /// Kind of event recorded.
    pub kind: LockKind,

    /// Day key the event was filed under.
    #[schema(example = "20250115")]
    pub day_key: String,

    /// Display label stored with the event.
    #[schema(example = "20250115 07:30:00")]
    pub timestamp_label: String,

    /// Instant the event was recorded for.
    #[schema(example = "2025-01-15T07:30:00+00:00")]
    pub recorded_at_utc: String,

    /// Whether a row was written. When false the event was dropped.
    #[schema(example = true)]
    pub recorded: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Record that the screen was unlocked now.
#[utoipa::path(
    post,
    path = "/api/events/unlock",
    tag = "events",
    operation_id = "recordUnlock",
    summary = "Record an unlock event",
    description = "Appends an unlock event stamped with the current time. The log \
        is best-effort: the request is accepted even if the store is unavailable.",
    responses(
        (status = 202, description = "Event accepted", body = RecordEventResponse)
    )
)]
pub async fn record_unlock(
    State(state): State<SharedState>,
) -> ApiResult<(StatusCode, Json<RecordEventResponse>)> {
    record(state, LockKind::Unlock).await
}

/// Record that the screen was locked now.
#[utoipa::path(
    post,
    path = "/api/events/lock",
    tag = "events",
    operation_id = "recordLock",
    summary = "Record a lock event",
    description = "Appends a lock event stamped with the current time. The log \
        is best-effort: the request is accepted even if the store is unavailable.",
    responses(
        (status = 202, description = "Event accepted", body = RecordEventResponse)
    )
)]
pub async fn record_lock(
    State(state): State<SharedState>,
) -> ApiResult<(StatusCode, Json<RecordEventResponse>)> {
    record(state, LockKind::Lock).await
}

async fn record(
    state: SharedState,
    kind: LockKind,
) -> ApiResult<(StatusCode, Json<RecordEventResponse>)> {
    let now = Utc::now();
    let day_key = state.event_log.day_key_for(now);
    let timestamp_label = state.event_log.timestamp_label_for(now);

    let recorded = tokio::task::spawn_blocking(move || state.event_log.record(kind, now))
        .await
        .map_err(|e| ApiError::task_failed(&e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RecordEventResponse {
            kind,
            day_key,
            timestamp_label,
            recorded_at_utc: now.to_rfc3339(),
            recorded,
        }),
    ))
}

/// Get the first event recorded on a day.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    operation_id = "lookupEvent",
    summary = "Look up the first event of a day",
    description = "Returns the earliest event filed under the given `yyyyMMdd` \
        day key, or today's key when `day` is omitted. Matching is exact.",
    params(EventLookupQuery),
    responses(
        (status = 200, description = "Event found", body = EventRecord),
        (status = 400, description = "Day key is not yyyyMMdd", body = crate::api::ErrorResponse),
        (status = 404, description = "No event for that day", body = crate::api::ErrorResponse)
    )
)]
pub async fn lookup_event(
    State(state): State<SharedState>,
    Query(query): Query<EventLookupQuery>,
) -> ApiResult<Json<EventRecord>> {
    let day_key = match query.day {
        Some(day) => validate_day_key(day)?,
        None => state.event_log.day_key_for(Utc::now()),
    };

    let lookup = day_key.clone();
    let record = tokio::task::spawn_blocking(move || state.event_log.lookup(Some(&lookup)))
        .await
        .map_err(|e| ApiError::task_failed(&e))?;

    record
        .map(Json)
        .ok_or_else(|| BleUnlockError::EventNotFound(day_key).into())
}

// ============================================================================
// Helpers
// ============================================================================

fn day_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{8}$").expect("day key pattern is valid"))
}

/// Reject anything that is not eight ASCII digits.
fn validate_day_key(day: String) -> Result<String, BleUnlockError> {
    if day_key_pattern().is_match(&day) {
        Ok(day)
    } else {
        Err(BleUnlockError::InvalidDayKey(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_day_key() {
        assert_eq!(validate_day_key("20250115".to_string()).unwrap(), "20250115");
        assert!(validate_day_key("2025-01-15".to_string()).is_err());
        assert!(validate_day_key("202501".to_string()).is_err());
        assert!(validate_day_key("2025011５".to_string()).is_err());
        assert!(validate_day_key(String::new()).is_err());
    }

    #[test]
    fn test_record_response_serialization() {
        let response = RecordEventResponse {
            kind: LockKind::Unlock,
            day_key: "20250115".to_string(),
            timestamp_label: "20250115 07:30:00".to_string(),
            recorded_at_utc: "2025-01-15T07:30:00+00:00".to_string(),
            recorded: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"kind\":\"unlock\""));
        assert!(json.contains("\"recorded\":false"));
    }

    #[test]
    fn test_lookup_query_deserialization() {
        let query: EventLookupQuery = serde_json::from_str(r#"{"day": "20250115"}"#).unwrap();
        assert_eq!(query.day.as_deref(), Some("20250115"));
        let query: EventLookupQuery = serde_json::from_str("{}").unwrap();
        assert!(query.day.is_none());
    }
}
