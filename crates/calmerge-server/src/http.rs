//! HTTP read path.
//!
//! Handlers only read the [`CacheStore`]; nothing here fetches upstream.
//! Before the first successful refresh the calendar endpoints answer
//! `503 Service Unavailable` with a `Retry-After` header.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::cache::{CacheEntry, CacheSnapshot, CacheStore};
use crate::merge::SourceStatus;
use crate::scheduler::{CyclePhase, SharedSchedulerState};

/// Path of the JSON rendering.
pub const JSON_PATH: &str = "/calendar.json";
/// Path of the status view.
pub const STATUS_PATH: &str = "/status";

const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CacheStore>,
    pub scheduler: SharedSchedulerState,
    /// Value of `Retry-After` while the cache is cold.
    pub retry_after_secs: u64,
}

/// Standard error body for JSON endpoints.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Builds the router with the ICS endpoint mounted at `ics_path`.
pub fn router(state: AppState, ics_path: &str) -> Router {
    Router::new()
        .route(ics_path, get(calendar_ics))
        .route(JSON_PATH, get(calendar_json))
        .route(STATUS_PATH, get(status))
        .with_state(state)
}

async fn calendar_ics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let entry = match state.store.read() {
        CacheSnapshot::Warm(entry) => entry,
        CacheSnapshot::Cold => {
            return not_warmed(
                (StatusCode::SERVICE_UNAVAILABLE, "calendar not yet available\n").into_response(),
                state.retry_after_secs,
            );
        }
    };

    if etag_matches(&headers, &entry.etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, entry.etag.clone())]).into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, ICS_CONTENT_TYPE.to_string()),
            (header::ETAG, entry.etag.clone()),
        ],
        entry.ics.clone(),
    )
        .into_response()
}

async fn calendar_json(State(state): State<AppState>) -> Response {
    match state.store.read() {
        CacheSnapshot::Warm(entry) => Json(&entry.calendar).into_response(),
        CacheSnapshot::Cold => not_warmed(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "calendar not yet available".to_string(),
                    retry_after_seconds: Some(state.retry_after_secs),
                }),
            )
                .into_response(),
            state.retry_after_secs,
        ),
    }
}

/// Observability view of the cache and the last cycle.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub warm: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub event_count: usize,
    pub etag: Option<String>,
    pub phase: CyclePhase,
    pub cycles_started: u64,
    pub cycles_swapped: u64,
    pub cycles_failed: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Per-source outcome of the most recent cycle, successful or not.
    pub sources: Vec<SourceStatus>,
}

async fn status(State(state): State<AppState>) -> Response {
    let snapshot = state.store.read();
    let entry: Option<&Arc<CacheEntry>> = snapshot.entry();
    let scheduler = state.scheduler.read().await.clone();

    let view = StatusView {
        warm: entry.is_some(),
        updated_at: entry.map(|e| e.updated_at),
        event_count: entry.map_or(0, |e| e.event_count()),
        etag: entry.map(|e| e.etag.clone()),
        phase: scheduler.phase,
        cycles_started: scheduler.cycles_started,
        cycles_swapped: scheduler.cycles_swapped,
        cycles_failed: scheduler.cycles_failed,
        last_attempt: scheduler.last_attempt,
        last_error: scheduler.last_error,
        sources: scheduler
            .last_report
            .map(|r| r.sources)
            .unwrap_or_default(),
    };
    Json(view).into_response()
}

fn not_warmed(mut response: Response, retry_after_secs: u64) -> Response {
    match HeaderValue::from_str(&retry_after_secs.to_string()) {
        Ok(value) => {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        Err(e) => error!(error = %e, "Invalid Retry-After value"),
    }
    response
}

/// True if any tag in `If-None-Match` equals `etag` (weak comparison) or
/// the header is `*`.
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    value.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_none_match_parsing() {
        let etag = "\"abc\"";
        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"xyz\", W/\"abc\""));
        assert!(etag_matches(&headers, etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(etag_matches(&headers, etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        assert!(!etag_matches(&headers, etag));
    }
}
