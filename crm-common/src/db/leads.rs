//! Lead table queries
//!
//! Every mutation refreshes `updated_at`. Timestamps are stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;

use super::models::{Lead, LeadFields, SentimentStatus};
use crate::{Error, Result};

const LEAD_COLUMNS: &str = "id, name, email, phone, status, notes, sentiment, sentiment_score, created_at, updated_at";

/// Result of an insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Lead),
    /// Another lead already uses this email
    Conflict,
}

/// Result of an update against a single lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// Unique constraint violated (duplicate email)
    Conflict,
}

/// Sentiment fields written by the enrichment task
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentUpdate {
    pub sentiment: SentimentStatus,
    pub score: Option<f64>,
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let sentiment: Option<String> = row.try_get("sentiment")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Lead {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: row.try_get("status")?,
        notes: row.try_get("notes")?,
        sentiment: SentimentStatus::from_label(sentiment.as_deref()),
        sentiment_score: row.try_get("sentiment_score")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Insert a new lead with the given initial sentiment status
pub async fn insert_lead(
    pool: &SqlitePool,
    fields: &LeadFields,
    sentiment: &SentimentStatus,
) -> Result<InsertOutcome> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO leads (
            name, email, phone, status, notes,
            sentiment, sentiment_score, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.status)
    .bind(&fields.notes)
    .bind(sentiment.as_label())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => return Ok(InsertOutcome::Conflict),
        Err(e) => return Err(e.into()),
    };

    let lead = get_lead(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Lead {} missing right after insert", id)))?;

    Ok(InsertOutcome::Created(lead))
}

/// Fetch one lead
pub async fn get_lead(pool: &SqlitePool, id: i64) -> Result<Option<Lead>> {
    let row = sqlx::query(&format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(lead_from_row).transpose()
}

/// Ids bound per `IN (...)` query, well under SQLite's host parameter limit
const IDS_PER_QUERY: usize = 500;

/// Fetch the leads matching `ids`, ordered by id; unknown and repeated ids are skipped
pub async fn get_leads(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Lead>> {
    let unique: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    let mut leads = Vec::new();
    for chunk in unique.chunks(IDS_PER_QUERY) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM leads WHERE id IN ({}) ORDER BY id",
            LEAD_COLUMNS, placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(*id);
        }

        for row in query.fetch_all(pool).await? {
            leads.push(lead_from_row(&row)?);
        }
    }

    Ok(leads)
}

/// All leads, newest first
pub async fn list_leads(pool: &SqlitePool) -> Result<Vec<Lead>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leads ORDER BY created_at DESC, id DESC",
        LEAD_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(lead_from_row).collect()
}

/// Overwrite the editable fields; resets the score and sets `sentiment`
pub async fn update_lead_details(
    pool: &SqlitePool,
    id: i64,
    fields: &LeadFields,
    sentiment: &SentimentStatus,
) -> Result<UpdateOutcome> {
    let result = sqlx::query(
        r#"
        UPDATE leads SET
            name = ?, email = ?, phone = ?, status = ?, notes = ?,
            sentiment = ?, sentiment_score = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.status)
    .bind(&fields.notes)
    .bind(sentiment.as_label())
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(UpdateOutcome::NotFound),
        Ok(_) => Ok(UpdateOutcome::Updated),
        Err(e) if is_unique_violation(&e) => Ok(UpdateOutcome::Conflict),
        Err(e) => Err(e.into()),
    }
}

/// Write sentiment status and score in a single statement
pub async fn update_sentiment(
    pool: &SqlitePool,
    id: i64,
    update: &SentimentUpdate,
) -> Result<UpdateOutcome> {
    let done = sqlx::query(
        "UPDATE leads SET sentiment = ?, sentiment_score = ?, updated_at = ? WHERE id = ?",
    )
    .bind(update.sentiment.as_label())
    .bind(update.score)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    if done.rows_affected() == 0 {
        Ok(UpdateOutcome::NotFound)
    } else {
        Ok(UpdateOutcome::Updated)
    }
}

/// Delete a lead; returns false if it did not exist
pub async fn delete_lead(pool: &SqlitePool, id: i64) -> Result<bool> {
    let done = sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(done.rows_affected() > 0)
}
