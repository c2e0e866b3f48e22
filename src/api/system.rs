//! Liveness endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::db::now;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
}

/// `GET /`
pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "API is running",
        status: "ok",
        timestamp: now(),
        database: None,
        uptime_seconds: None,
        version: None,
    })
}

/// `GET /api/health`. 503 when the database does not answer.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let database = match state.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            message: "API is running",
            status,
            timestamp: now(),
            database: Some(database),
            uptime_seconds: Some(state.start_time.elapsed().as_secs()),
            version: Some(env!("CARGO_PKG_VERSION")),
        }),
    )
        .into_response()
}
