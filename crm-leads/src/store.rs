//! Lead store seam used by the enrichment pipeline
//!
//! The pipeline only needs two operations: read a lead fresh, and write its
//! sentiment fields in one update. Keeping it behind a trait lets the pipeline
//! run against something other than SQLite.

use async_trait::async_trait;
use crm_common::db::leads::{self, SentimentUpdate, UpdateOutcome};
use crm_common::db::Lead;
use crm_common::Result;
use sqlx::SqlitePool;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Lead>>;

    async fn update_sentiment(&self, id: i64, update: SentimentUpdate) -> Result<UpdateOutcome>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteLeadStore {
    pool: SqlitePool,
}

impl SqliteLeadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for SqliteLeadStore {
    async fn get(&self, id: i64) -> Result<Option<Lead>> {
        leads::get_lead(&self.pool, id).await
    }

    async fn update_sentiment(&self, id: i64, update: SentimentUpdate) -> Result<UpdateOutcome> {
        leads::update_sentiment(&self.pool, id, &update).await
    }
}
