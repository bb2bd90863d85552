//! Sentiment model backends
//!
//! A [`SentimentModel`] turns text into a raw `(label, score)` prediction using
//! whatever vocabulary the backend speaks (`POSITIVE`, `LABEL_0`, ...). Label
//! normalization happens in the classifier, not here.
//!
//! Backends:
//! - [`LexiconSentimentModel`]: built-in word lists, deterministic, no network
//! - [`HttpSentimentModel`]: Hugging Face style text-classification endpoint

use async_trait::async_trait;
use crm_common::config::{ClassifierBackend, ClassifierConfig};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model could not be constructed
    #[error("Model initialization failed: {0}")]
    Init(String),

    /// Inference request failed (network, timeout, HTTP status)
    #[error("Inference request failed: {0}")]
    Request(String),

    /// Inference response could not be understood
    #[error("Malformed inference response: {0}")]
    Response(String),
}

/// Raw model output before label normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    pub score: Option<f64>,
}

/// Text classification capability
#[async_trait]
pub trait SentimentModel: Send + Sync {
    /// Model name for diagnostics
    fn name(&self) -> &str;

    async fn infer(&self, text: &str) -> Result<RawPrediction, ModelError>;
}

/// Builds a model; invoked at most once per classifier
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn SentimentModel>, ModelError>;
}

/// Loader driven by the `[classifier]` config section
#[derive(Debug, Clone)]
pub struct ConfiguredModelLoader {
    config: ClassifierConfig,
}

impl ConfiguredModelLoader {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for ConfiguredModelLoader {
    async fn load(&self) -> Result<Arc<dyn SentimentModel>, ModelError> {
        match self.config.backend {
            ClassifierBackend::Lexicon => {
                tracing::info!("Loading built-in lexicon sentiment model");
                Ok(Arc::new(LexiconSentimentModel::new()))
            }
            ClassifierBackend::Http => {
                let endpoint = self
                    .config
                    .endpoint
                    .clone()
                    .ok_or_else(|| ModelError::Init("classifier endpoint not configured".to_string()))?;
                tracing::info!(
                    model = %self.config.model,
                    endpoint = %endpoint,
                    "Connecting to sentiment inference endpoint"
                );
                let model = HttpSentimentModel::new(
                    endpoint,
                    self.config.api_token.clone(),
                    self.config.model.clone(),
                    Duration::from_millis(self.config.timeout_ms),
                )?;
                Ok(Arc::new(model))
            }
        }
    }
}

// ============================================================================
// Lexicon backend
// ============================================================================

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "appreciate", "awesome", "best", "brilliant", "delighted", "eager",
    "enjoy", "enjoyed", "excellent", "excited", "fantastic", "glad", "good", "great",
    "happy", "helpful", "impressed", "interested", "keen", "like", "love", "loved",
    "perfect", "pleased", "positive", "promising", "recommend", "satisfied", "thanks",
    "useful", "valuable", "wonderful", "yes",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoyed", "awful", "bad", "broken", "cancel", "complaint", "confused",
    "disappointed", "disappointing", "dislike", "expensive", "frustrated", "hate",
    "horrible", "issue", "issues", "negative", "poor", "problem", "problems", "refund",
    "slow", "terrible", "unhappy", "unhelpful", "upset", "useless", "worse", "worst",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "wasn't", "won't",
    "can't", "cannot",
];

/// Word-list model producing `POSITIVE` / `NEGATIVE` / `NEUTRAL`
///
/// A negator flips the polarity of the sentiment word that follows it.
/// Confidence is always within `[0.5, 1.0]`.
#[derive(Debug)]
pub struct LexiconSentimentModel {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negators: HashSet<&'static str>,
}

impl LexiconSentimentModel {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negators: NEGATORS.iter().copied().collect(),
        }
    }

    fn predict(&self, text: &str) -> RawPrediction {
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty());

        let mut positive = 0u32;
        let mut negative = 0u32;
        let mut negate_next = false;

        for word in words {
            if self.negators.contains(word) {
                negate_next = true;
                continue;
            }

            let polarity = if self.positive.contains(word) {
                Some(true)
            } else if self.negative.contains(word) {
                Some(false)
            } else {
                None
            };

            if let Some(is_positive) = polarity {
                if is_positive != negate_next {
                    positive += 1;
                } else {
                    negative += 1;
                }
                negate_next = false;
            }
        }

        let total = f64::from(positive + negative);
        let (label, margin) = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => ("POSITIVE", f64::from(positive - negative)),
            std::cmp::Ordering::Less => ("NEGATIVE", f64::from(negative - positive)),
            std::cmp::Ordering::Equal => ("NEUTRAL", 1.0),
        };

        RawPrediction {
            label: label.to_string(),
            score: Some(0.5 + 0.5 * margin / (total + 1.0)),
        }
    }
}

impl Default for LexiconSentimentModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentModel for LexiconSentimentModel {
    fn name(&self) -> &str {
        "lexicon"
    }

    async fn infer(&self, text: &str) -> Result<RawPrediction, ModelError> {
        Ok(self.predict(text))
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

/// Hugging Face style inference endpoint client
///
/// Sends `{"inputs": text}` and accepts either `[{label, score}, ...]` or
/// `[[{label, score}, ...]]`, keeping the highest scoring entry.
pub struct HttpSentimentModel {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    model: String,
}

impl HttpSentimentModel {
    pub fn new(
        endpoint: String,
        api_token: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Init(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_token,
            model,
        })
    }
}

#[async_trait]
impl SentimentModel for HttpSentimentModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn infer(&self, text: &str) -> Result<RawPrediction, ModelError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "inputs": text }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Request(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ModelError::Response(e.to_string()))?;

        parse_inference_response(&value)
    }
}

/// Pick the best `{label, score}` entry out of an inference response
pub fn parse_inference_response(value: &Value) -> Result<RawPrediction, ModelError> {
    let mut entries = value
        .as_array()
        .ok_or_else(|| ModelError::Response(format!("expected a JSON array, got {}", value)))?;

    // [[...]] wraps one result list per input
    if let Some(inner) = entries.first().and_then(Value::as_array) {
        entries = inner;
    }

    let mut best: Option<RawPrediction> = None;
    for entry in entries {
        let Some(label) = entry.get("label").and_then(Value::as_str) else {
            continue;
        };
        let score = entry.get("score").and_then(Value::as_f64);

        let better = match &best {
            None => true,
            Some(current) => score.unwrap_or(f64::MIN) > current.score.unwrap_or(f64::MIN),
        };
        if better {
            best = Some(RawPrediction {
                label: label.to_string(),
                score,
            });
        }
    }

    best.ok_or_else(|| ModelError::Response(format!("no labelled prediction in {}", value)))
}
