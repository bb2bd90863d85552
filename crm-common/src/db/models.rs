//! Lead record model and sentiment status vocabulary

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Pipeline status values a lead may carry
pub const LEAD_STATUSES: [&str; 5] = ["New", "Contacted", "In Progress", "Converted", "Lost"];

/// Sentiment enrichment status
///
/// `NotAnalyzed` is stored as SQL NULL; every other variant as its label text.
/// `Other` carries a pass-through label the classifier did not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SentimentStatus {
    /// No notes, or classification unavailable
    NotAnalyzed,
    /// Enrichment pending in the background
    Analyzing,
    Positive,
    Neutral,
    Negative,
    /// Unrecognized (title-cased) model label
    Other(String),
}

impl SentimentStatus {
    /// Label text as persisted in the `sentiment` column
    pub fn as_label(&self) -> Option<&str> {
        match self {
            SentimentStatus::NotAnalyzed => None,
            SentimentStatus::Analyzing => Some("Analyzing"),
            SentimentStatus::Positive => Some("Positive"),
            SentimentStatus::Neutral => Some("Neutral"),
            SentimentStatus::Negative => Some("Negative"),
            SentimentStatus::Other(label) => Some(label.as_str()),
        }
    }

    /// Parse the `sentiment` column
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            None => SentimentStatus::NotAnalyzed,
            Some(s) if s.trim().is_empty() => SentimentStatus::NotAnalyzed,
            Some("Analyzing") => SentimentStatus::Analyzing,
            Some("Positive") => SentimentStatus::Positive,
            Some("Neutral") => SentimentStatus::Neutral,
            Some("Negative") => SentimentStatus::Negative,
            Some(other) => SentimentStatus::Other(other.to_string()),
        }
    }

    /// Human-facing name (`Not Analyzed` for the NULL state)
    pub fn display_name(&self) -> &str {
        self.as_label().unwrap_or("Not Analyzed")
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, SentimentStatus::Analyzing)
    }

    /// Status a content write should leave behind for the given notes
    pub fn for_notes(notes: Option<&str>) -> Self {
        if has_text(notes) {
            SentimentStatus::Analyzing
        } else {
            SentimentStatus::NotAnalyzed
        }
    }
}

impl fmt::Display for SentimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Serialize for SentimentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_label() {
            Some(label) => serializer.serialize_str(label),
            None => serializer.serialize_none(),
        }
    }
}

fn has_text(text: Option<&str>) -> bool {
    text.map_or(false, |t| !t.trim().is_empty())
}

/// Persisted lead record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub sentiment: SentimentStatus,
    pub sentiment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator-editable lead fields, already normalized
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeadFields {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}
