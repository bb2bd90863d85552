//! crm-leads library - lead records with background sentiment enrichment
//!
//! Exposes the router and pipeline services for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod forms;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{EnrichmentDispatcher, SentimentClassifier};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bound enrichment dispatcher
    pub dispatcher: Arc<EnrichmentDispatcher>,
    /// Classifier shared with the dispatcher's workers (health reporting)
    pub classifier: Arc<SentimentClassifier>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        dispatcher: Arc<EnrichmentDispatcher>,
        classifier: Arc<SentimentClassifier>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            classifier,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lead_routes())
        .merge(api::status_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
