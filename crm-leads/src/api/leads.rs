//! Lead CRUD handlers
//!
//! Create and edit set the sentiment status synchronously (`Analyzing` when the
//! notes are non-empty, `NotAnalyzed` otherwise), commit, and only then queue
//! background enrichment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use crm_common::db::leads::{self, InsertOutcome, UpdateOutcome};
use crm_common::db::{Lead, SentimentStatus, LEAD_STATUSES};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::forms::{parse_lead_form, validate_lead_form, LeadForm};
use crate::services::enqueue_enrichment;
use crate::AppState;

const DUPLICATE_EMAIL: &str = "A lead with this email already exists.";

/// Sentiment buckets shown on the dashboard, in display order
const SENTIMENT_BUCKETS: [&str; 5] = ["Positive", "Neutral", "Negative", "Not Analyzed", "Analyzing"];

/// Lead as shown on the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: String,
    pub notes: String,
    /// Display name; `Not Analyzed` instead of null
    pub sentiment: String,
    pub is_analyzing: bool,
    pub sentiment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Lead> for LeadSummary {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id,
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone().unwrap_or_default(),
            status: lead.status.clone(),
            notes: lead.notes.clone().unwrap_or_default(),
            sentiment: lead.sentiment.display_name().to_string(),
            is_analyzing: lead.sentiment.is_analyzing(),
            sentiment_score: lead.sentiment_score.map(|s| (s * 10_000.0).round() / 10_000.0),
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

/// GET /leads response
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub leads: Vec<LeadSummary>,
    pub statuses: Vec<String>,
    pub status_counts: BTreeMap<String, usize>,
    pub sentiment_summary: BTreeMap<String, usize>,
    pub total_leads: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// GET /leads
pub async fn list_leads(State(state): State<AppState>) -> ApiResult<Json<DashboardResponse>> {
    let all = leads::list_leads(&state.db).await?;

    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut sentiment_summary: BTreeMap<String, usize> = SENTIMENT_BUCKETS
        .iter()
        .map(|bucket| (bucket.to_string(), 0))
        .collect();

    for lead in &all {
        *status_counts.entry(lead.status.clone()).or_default() += 1;
        if let Some(count) = sentiment_summary.get_mut(lead.sentiment.display_name()) {
            *count += 1;
        }
    }

    Ok(Json(DashboardResponse {
        leads: all.iter().map(LeadSummary::from).collect(),
        statuses: LEAD_STATUSES.iter().map(|s| s.to_string()).collect(),
        status_counts,
        sentiment_summary,
        total_leads: all.len(),
        last_updated: all.iter().map(|lead| lead.updated_at).max(),
    }))
}

/// POST /leads/add
pub async fn add_lead(
    State(state): State<AppState>,
    Json(form): Json<LeadForm>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let fields = parse_lead_form(&form);
    let errors = validate_lead_form(&fields);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let sentiment = SentimentStatus::for_notes(fields.notes.as_deref());
    let lead = match leads::insert_lead(&state.db, &fields, &sentiment).await? {
        InsertOutcome::Created(lead) => lead,
        InsertOutcome::Conflict => return Err(ApiError::Conflict(DUPLICATE_EMAIL.to_string())),
    };

    tracing::info!(lead_id = lead.id, sentiment = %lead.sentiment, "Lead created");

    if lead.sentiment.is_analyzing() {
        enqueue_enrichment(&state.dispatcher, lead.id)?;
    }

    Ok((StatusCode::CREATED, Json(lead)))
}

/// POST /leads/edit/:id
///
/// Any edit that leaves notes in place restarts enrichment.
pub async fn edit_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<i64>,
    Json(form): Json<LeadForm>,
) -> ApiResult<Json<Lead>> {
    if leads::get_lead(&state.db, lead_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Lead not found: {}", lead_id)));
    }

    let fields = parse_lead_form(&form);
    let errors = validate_lead_form(&fields);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let sentiment = SentimentStatus::for_notes(fields.notes.as_deref());
    match leads::update_lead_details(&state.db, lead_id, &fields, &sentiment).await? {
        UpdateOutcome::Updated => {}
        UpdateOutcome::NotFound => {
            return Err(ApiError::NotFound(format!("Lead not found: {}", lead_id)))
        }
        UpdateOutcome::Conflict => return Err(ApiError::Conflict(DUPLICATE_EMAIL.to_string())),
    }

    tracing::info!(lead_id, sentiment = %sentiment, "Lead updated");

    // Read back before queueing so the response shows the committed state
    let lead = leads::get_lead(&state.db, lead_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Lead not found: {}", lead_id)))?;

    if sentiment.is_analyzing() {
        enqueue_enrichment(&state.dispatcher, lead_id)?;
    }

    Ok(Json(lead))
}

/// POST /leads/delete/:id
pub async fn delete_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !leads::delete_lead(&state.db, lead_id).await? {
        return Err(ApiError::NotFound(format!("Lead not found: {}", lead_id)));
    }

    tracing::info!(lead_id, "Lead deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build lead CRUD routes
pub fn lead_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads))
        .route("/leads", get(list_leads))
        .route("/leads/add", post(add_lead))
        .route("/leads/edit/:id", post(edit_lead))
        .route("/leads/delete/:id", post(delete_lead))
}
