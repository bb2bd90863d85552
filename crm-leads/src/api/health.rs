//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Configured enrichment worker count
    pub enrichment_workers: usize,
    /// Enrichment jobs queued or running
    pub enrichment_in_flight: usize,
    /// Loaded sentiment model, if it has been loaded yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_model: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "crm-leads".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        enrichment_workers: state.dispatcher.workers(),
        enrichment_in_flight: state.dispatcher.in_flight(),
        classifier_model: state.classifier.model_name(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
