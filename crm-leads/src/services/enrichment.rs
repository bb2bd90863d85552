//! Sentiment enrichment task
//!
//! Lead sentiment lifecycle:
//!
//! ```text
//! NotAnalyzed ──(write with notes)──> Analyzing ──(task)──> Positive | Negative | Neutral | Other
//!      ^                                  │
//!      └──────(notes cleared / no label)──┘
//! ```
//!
//! The request handler performs `-> Analyzing` synchronously, commits, then calls
//! [`enqueue_enrichment`]. The task re-reads the lead when it runs instead of
//! trusting anything captured at submission, so racing tasks for one lead
//! converge on the notes present at the last read. If the process dies between
//! the commit and the submission the lead stays `Analyzing` until edited again;
//! nothing sweeps for that.

use crm_common::db::leads::{SentimentUpdate, UpdateOutcome};
use crm_common::db::SentimentStatus;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::classifier::SentimentClassifier;
use super::dispatcher::{DispatchError, TaskDispatcher};
use crate::store::{LeadStore, SqliteLeadStore};

/// Handles every enrichment job runs with
#[derive(Clone)]
pub struct EnrichmentContext {
    pub store: Arc<dyn LeadStore>,
    pub classifier: Arc<SentimentClassifier>,
}

pub type EnrichmentDispatcher = TaskDispatcher<EnrichmentContext>;

/// What a single task run did
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// Wrote a classification, or `NotAnalyzed` when the classifier had none
    Classified {
        sentiment: SentimentStatus,
        score: Option<f64>,
    },
    /// Notes were empty at execution time; wrote `NotAnalyzed`
    Cleared,
    /// Lead was deleted; nothing written
    LeadMissing,
    /// Read or write failed; lead left as it was
    StoreFailed,
}

/// Create a dispatcher bound to a SQLite-backed context
pub fn start_enrichment(
    pool: SqlitePool,
    classifier: Arc<SentimentClassifier>,
    workers: usize,
) -> Result<Arc<EnrichmentDispatcher>, DispatchError> {
    let dispatcher = Arc::new(EnrichmentDispatcher::new(workers));
    dispatcher.bind(EnrichmentContext {
        store: Arc::new(SqliteLeadStore::new(pool)),
        classifier,
    })?;
    Ok(dispatcher)
}

/// Queue background enrichment for `lead_id`
///
/// Call only after the write that set the lead to `Analyzing` has committed.
pub fn enqueue_enrichment(
    dispatcher: &EnrichmentDispatcher,
    lead_id: i64,
) -> Result<(), DispatchError> {
    dispatcher.submit(move |ctx: EnrichmentContext| async move {
        run_enrichment(ctx.store.as_ref(), &ctx.classifier, lead_id).await;
    })?;
    tracing::debug!(lead_id, "Sentiment enrichment queued");
    Ok(())
}

/// Classify a lead's current notes and store the result
pub async fn run_enrichment(
    store: &dyn LeadStore,
    classifier: &SentimentClassifier,
    lead_id: i64,
) -> EnrichmentOutcome {
    let lead = match store.get(lead_id).await {
        Ok(Some(lead)) => lead,
        Ok(None) => {
            tracing::warn!(lead_id, "Lead deleted before sentiment enrichment ran; skipping");
            return EnrichmentOutcome::LeadMissing;
        }
        Err(e) => {
            tracing::error!(lead_id, error = %e, "Failed to load lead for sentiment enrichment");
            return EnrichmentOutcome::StoreFailed;
        }
    };

    let (update, outcome) = match lead.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        None => (
            SentimentUpdate {
                sentiment: SentimentStatus::NotAnalyzed,
                score: None,
            },
            EnrichmentOutcome::Cleared,
        ),
        Some(notes) => {
            let classification = classifier.classify(notes).await;
            let sentiment = classification
                .label
                .map(|label| label.into_status())
                .unwrap_or(SentimentStatus::NotAnalyzed);
            let score = classification.score;
            (
                SentimentUpdate {
                    sentiment: sentiment.clone(),
                    score,
                },
                EnrichmentOutcome::Classified { sentiment, score },
            )
        }
    };

    let sentiment = update.sentiment.clone();
    match store.update_sentiment(lead_id, update).await {
        Ok(UpdateOutcome::Updated) => {
            tracing::info!(lead_id, sentiment = %sentiment, "Sentiment enrichment stored");
            outcome
        }
        Ok(UpdateOutcome::NotFound) => {
            tracing::warn!(lead_id, "Lead deleted during sentiment enrichment; result discarded");
            EnrichmentOutcome::LeadMissing
        }
        Ok(UpdateOutcome::Conflict) => {
            tracing::error!(lead_id, "Sentiment write rejected by store; lead stays Analyzing");
            EnrichmentOutcome::StoreFailed
        }
        Err(e) => {
            tracing::error!(
                lead_id,
                error = %e,
                "Failed to store sentiment result; lead stays Analyzing until next edit"
            );
            EnrichmentOutcome::StoreFailed
        }
    }
}
