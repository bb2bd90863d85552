//! Shared test helpers for crm-leads integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use crm_common::db::{create_leads_table, leads, Lead, SentimentStatus};
use crm_leads::services::model::{LexiconSentimentModel, RawPrediction};
use crm_leads::services::{
    start_enrichment, ModelError, ModelLoader, SentimentClassifier, SentimentModel,
};
use crm_leads::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory database on a single connection, so every query sees the same data
pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_leads_table(&pool).await.unwrap();
    pool
}

/// Lexicon model that counts calls and can be slowed down
pub struct InstrumentedModel {
    inner: LexiconSentimentModel,
    pub calls: Arc<AtomicUsize>,
    pub running: Arc<AtomicUsize>,
    pub max_running: Arc<AtomicUsize>,
    pub delay: Duration,
}

#[async_trait]
impl SentimentModel for InstrumentedModel {
    fn name(&self) -> &str {
        "instrumented-lexicon"
    }

    async fn infer(&self, text: &str) -> Result<RawPrediction, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.inner.infer(text).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Loader handing out one shared [`InstrumentedModel`], counting loads
pub struct InstrumentedLoader {
    pub loads: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub running: Arc<AtomicUsize>,
    pub max_running: Arc<AtomicUsize>,
    pub load_delay: Duration,
    pub infer_delay: Duration,
}

impl InstrumentedLoader {
    pub fn new(load_delay: Duration, infer_delay: Duration) -> Self {
        Self {
            loads: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
            load_delay,
            infer_delay,
        }
    }
}

#[async_trait]
impl ModelLoader for InstrumentedLoader {
    async fn load(&self) -> Result<Arc<dyn SentimentModel>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(Arc::new(InstrumentedModel {
            inner: LexiconSentimentModel::new(),
            calls: Arc::clone(&self.calls),
            running: Arc::clone(&self.running),
            max_running: Arc::clone(&self.max_running),
            delay: self.infer_delay,
        }))
    }
}

/// Loader that always fails
pub struct FailingLoader;

#[async_trait]
impl ModelLoader for FailingLoader {
    async fn load(&self) -> Result<Arc<dyn SentimentModel>, ModelError> {
        Err(ModelError::Init("model weights not found".to_string()))
    }
}

pub fn lexicon_classifier() -> Arc<SentimentClassifier> {
    Arc::new(SentimentClassifier::new(
        Arc::new(InstrumentedLoader::new(Duration::ZERO, Duration::ZERO)),
        512,
    ))
}

/// App state with a bound two-worker dispatcher
pub async fn test_app_state() -> AppState {
    let pool = setup_db().await;
    let classifier = lexicon_classifier();
    let dispatcher = start_enrichment(pool.clone(), Arc::clone(&classifier), 2).unwrap();
    AppState::new(pool, dispatcher, classifier)
}

pub fn test_app(state: &AppState) -> axum::Router {
    build_router(state.clone())
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Poll the store until the lead leaves `Analyzing`
pub async fn wait_until_settled(pool: &SqlitePool, id: i64) -> Lead {
    for _ in 0..500 {
        let lead = leads::get_lead(pool, id)
            .await
            .unwrap()
            .expect("lead should exist");
        if lead.sentiment != SentimentStatus::Analyzing {
            return lead;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("lead {} still Analyzing after 5s", id);
}
