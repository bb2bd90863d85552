//! Sentiment classifier adapter
//!
//! Wraps a [`SentimentModel`] behind a contract that never fails:
//! - blank text short-circuits to "no classification" without touching the model
//! - input is truncated to `max_input_chars` characters
//! - raw labels are normalized to Positive / Negative / Neutral, anything else
//!   is title-cased and passed through, except labels that would read back as
//!   a pipeline state (`Analyzing`, `Not Analyzed`, blank)
//! - model load and inference errors are logged and degrade to "no classification"
//!
//! The model is loaded lazily on first use through a [`OnceCell`], so concurrent
//! first calls still trigger exactly one load.

use crm_common::db::SentimentStatus;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::model::{ModelError, ModelLoader, SentimentModel};

/// Normalized classification label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    /// Title-cased label the model emitted that we don't recognize
    Other(String),
}

impl SentimentLabel {
    /// Terminal status this label settles a lead into
    pub fn into_status(self) -> SentimentStatus {
        match self {
            SentimentLabel::Positive => SentimentStatus::Positive,
            SentimentLabel::Negative => SentimentStatus::Negative,
            SentimentLabel::Neutral => SentimentStatus::Neutral,
            SentimentLabel::Other(label) => SentimentStatus::Other(label),
        }
    }
}

/// Classifier result; both fields are `None` when no classification is available
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub label: Option<SentimentLabel>,
    pub score: Option<f64>,
}

impl Classification {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Map a raw model label onto the normalized vocabulary
///
/// Returns `None` for labels that collide with a pipeline state once stored.
pub fn normalize_label(raw: &str) -> Option<SentimentLabel> {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "POSITIVE" | "LABEL_1" => Some(SentimentLabel::Positive),
        "NEGATIVE" | "LABEL_0" => Some(SentimentLabel::Negative),
        "NEUTRAL" => Some(SentimentLabel::Neutral),
        _ => {
            let label = title_case(&upper);
            let reserved = label.is_empty()
                || label == SentimentStatus::Analyzing.display_name()
                || label == SentimentStatus::NotAnalyzed.display_name();
            (!reserved).then_some(SentimentLabel::Other(label))
        }
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Sentiment classifier adapter, shared by every enrichment worker
pub struct SentimentClassifier {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SentimentModel>>,
    max_input_chars: usize,
}

impl SentimentClassifier {
    pub fn new(loader: Arc<dyn ModelLoader>, max_input_chars: usize) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            max_input_chars: max_input_chars.max(1),
        }
    }

    /// True once the model has been loaded
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Name of the loaded model, if any
    pub fn model_name(&self) -> Option<String> {
        self.model.get().map(|m| m.name().to_string())
    }

    /// Load the model now instead of on the first classification
    pub async fn warm_up(&self) -> Result<(), ModelError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<&Arc<dyn SentimentModel>, ModelError> {
        // A failed load leaves the cell empty; the next call tries again
        self.model.get_or_try_init(|| self.loader.load()).await
    }

    /// Classify `text`; never fails
    pub async fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return Classification::none();
        }

        let input: String = text.chars().take(self.max_input_chars).collect();

        let model = match self.model().await {
            Ok(model) => model,
            Err(e) => {
                tracing::error!(error = %e, "Sentiment model failed to load");
                return Classification::none();
            }
        };

        match model.infer(&input).await {
            Ok(raw) => {
                tracing::debug!(
                    model = model.name(),
                    label = %raw.label,
                    score = ?raw.score,
                    "Sentiment raw result"
                );
                let Some(label) = normalize_label(&raw.label) else {
                    tracing::warn!(
                        model = model.name(),
                        label = %raw.label,
                        "Sentiment model returned a reserved label; discarding"
                    );
                    return Classification::none();
                };
                Classification {
                    label: Some(label),
                    score: raw.score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 1.0)),
                }
            }
            Err(e) => {
                tracing::error!(
                    model = model.name(),
                    input_chars = input.chars().count(),
                    error = %e,
                    "Sentiment analysis failed"
                );
                Classification::none()
            }
        }
    }
}
