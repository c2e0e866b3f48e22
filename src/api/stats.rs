//! Dashboard aggregates under `/api/stats`.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiMessage, AppState, StatsBody};
use crate::services::stats_service::Overview;

#[derive(Debug, Serialize)]
pub struct OverviewBody {
    pub overview: Overview,
}

/// `GET /api/stats/view`
pub async fn overview(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let overview = state.stats_service().overview().await?;
    Ok(ApiMessage::new("OK", OverviewBody { overview }).into_response())
}

/// `GET /api/stats/users`
pub async fn users(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let stats = state.stats_service().users().await?;
    Ok(ApiMessage::new("OK", StatsBody { stats }).into_response())
}

/// `GET /api/stats/templates`
pub async fn templates(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let stats = state.stats_service().templates().await?;
    Ok(ApiMessage::new("OK", StatsBody { stats }).into_response())
}

/// `GET /api/stats/requests`
pub async fn requests(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let stats = state.stats_service().requests().await?;
    Ok(ApiMessage::new("OK", StatsBody { stats }).into_response())
}
