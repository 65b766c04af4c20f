//! API endpoint handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;

use super::AppState;
use crate::config::ScrapeMode;
use crate::repository::DieselError;

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const MAX_HISTORY_LIMIT: i64 = 1000;

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// A failed store read is logged and answered as 503, so callers can tell
/// an unreachable store from a genuinely empty one.
fn store_unavailable(operation: &str, e: DieselError) -> Response {
    error!("Store read failed for {}: {}", operation, e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(serde_json::json!({ "error": "store unavailable" })),
    )
        .into_response()
}

/// Health check endpoint for container orchestration.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.count().await {
        Ok(count) => axum::Json(serde_json::json!({
            "status": "ok",
            "records": count,
        }))
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(serde_json::json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

/// Most recent stored record, shaped by the configured scrape mode.
pub async fn latest(State(state): State<AppState>) -> impl IntoResponse {
    let record = match state.mode {
        ScrapeMode::Single => state.repo.latest(1).await.map(|rows| {
            rows.into_iter()
                .next()
                .and_then(|r| serde_json::to_value(r).ok())
        }),
        ScrapeMode::Multi => state.repo.latest_multi(1).await.map(|rows| {
            rows.into_iter()
                .next()
                .and_then(|r| serde_json::to_value(r).ok())
        }),
    };

    match record {
        Ok(Some(value)) => axum::Json(value).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": "no records stored yet" })),
        )
            .into_response(),
        Err(e) => store_unavailable("latest", e),
    }
}

/// Stored records, newest first. An explicit start/end window returns the
/// window in ascending order instead.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let result = match (state.mode, params.start, params.end) {
        (ScrapeMode::Single, Some(start), Some(end)) => state
            .repo
            .range(start, end, limit)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default()),
        (ScrapeMode::Single, _, _) => state
            .repo
            .latest(limit)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default()),
        (ScrapeMode::Multi, Some(start), Some(end)) => state
            .repo
            .range_multi(start, end, limit)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default()),
        (ScrapeMode::Multi, _, _) => state
            .repo
            .latest_multi(limit)
            .await
            .map(|rows| serde_json::to_value(rows).unwrap_or_default()),
    };

    match result {
        Ok(value) => axum::Json(value).into_response(),
        Err(e) => store_unavailable("history", e),
    }
}

/// Trigger one scrape-and-persist run in the configured mode.
pub async fn trigger_scrape(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.run_once(state.mode).await {
        Ok(outcome) => {
            let status = if outcome.persisted() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                axum::Json(serde_json::json!({
                    "price": outcome.primary_price(),
                    "sources": outcome.source_count(),
                    "persisted": outcome.persisted(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Manual scrape failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
