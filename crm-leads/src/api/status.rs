//! Sentiment status polling
//!
//! `GET /leads/status?ids=1,2,3` reports the enrichment state of each lead.
//! Clients poll until every `is_analyzing` is false. Unknown ids are left out
//! of the response, so a deleted lead simply stops appearing. Malformed id
//! tokens are ignored rather than rejected.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use crm_common::db::{leads, SentimentStatus};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, AppState};

/// Query parameters for status polling
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Comma-separated lead ids
    #[serde(default)]
    pub ids: Option<String>,
}

/// One lead's enrichment state
#[derive(Debug, Serialize)]
pub struct LeadStatusEntry {
    pub id: i64,
    /// `null` while not analyzed
    pub sentiment: SentimentStatus,
    pub sentiment_score: Option<f64>,
    pub is_analyzing: bool,
    pub updated_at: DateTime<Utc>,
}

/// Parse `1, 2,,abc,3` into `[1, 2, 3]`; anything not all ASCII digits is dropped
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse::<i64>().ok())
        .collect()
}

/// GET /leads/status?ids=...
pub async fn leads_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Vec<LeadStatusEntry>>> {
    let ids = parse_id_list(query.ids.as_deref().unwrap_or_default());
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let entries = leads::get_leads(&state.db, &ids)
        .await?
        .into_iter()
        .map(|lead| LeadStatusEntry {
            id: lead.id,
            is_analyzing: lead.sentiment.is_analyzing(),
            sentiment: lead.sentiment,
            sentiment_score: lead.sentiment_score,
            updated_at: lead.updated_at,
        })
        .collect();

    Ok(Json(entries))
}

/// Build status polling routes
pub fn status_routes() -> Router<AppState> {
    Router::new().route("/leads/status", get(leads_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list_drops_malformed_tokens() {
        assert_eq!(parse_id_list("abc,,3"), vec![3]);
        assert_eq!(parse_id_list(" 1 , 2,x2,-4,5.0"), vec![1, 2]);
        assert!(parse_id_list("").is_empty());
        assert!(parse_id_list(",,,").is_empty());
    }

    #[test]
    fn test_parse_id_list_ignores_overflow() {
        assert_eq!(parse_id_list("99999999999999999999999,7"), vec![7]);
    }
}
