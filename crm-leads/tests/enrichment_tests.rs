//! Enrichment pipeline tests
//!
//! Exercise the task, classifier and dispatcher together against SQLite,
//! including the racy cases: overlapping tasks for one lead, deletion while a
//! task is queued, and concurrent first use of the classifier.

mod helpers;

use crm_common::db::leads::{self, InsertOutcome};
use crm_common::db::{LeadFields, SentimentStatus};
use crm_leads::services::{
    enqueue_enrichment, run_enrichment, start_enrichment, EnrichmentOutcome, SentimentClassifier,
};
use crm_leads::store::SqliteLeadStore;
use helpers::*;
use sqlx::SqlitePool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn fields(email: &str, notes: Option<&str>) -> LeadFields {
    LeadFields {
        name: "Pipeline Lead".to_string(),
        email: email.to_string(),
        phone: None,
        status: "Contacted".to_string(),
        notes: notes.map(str::to_string),
    }
}

async fn insert(pool: &SqlitePool, email: &str, notes: Option<&str>) -> i64 {
    let fields = fields(email, notes);
    let sentiment = SentimentStatus::for_notes(fields.notes.as_deref());
    match leads::insert_lead(pool, &fields, &sentiment).await.unwrap() {
        InsertOutcome::Created(lead) => lead.id,
        InsertOutcome::Conflict => panic!("unexpected conflict for {}", email),
    }
}

async fn edit_notes(pool: &SqlitePool, id: i64, email: &str, notes: Option<&str>) {
    let fields = fields(email, notes);
    let sentiment = SentimentStatus::for_notes(fields.notes.as_deref());
    leads::update_lead_details(pool, id, &fields, &sentiment)
        .await
        .unwrap();
}

async fn wait_for_drain(dispatcher: &crm_leads::services::EnrichmentDispatcher) {
    for _ in 0..500 {
        if dispatcher.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dispatcher did not drain");
}

#[tokio::test]
async fn test_rerunning_task_is_idempotent() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let classifier = lexicon_classifier();
    let id = insert(&pool, "idem@example.com", Some("Not happy, the product is slow")).await;

    let first = run_enrichment(&store, &classifier, id).await;
    let after_first = leads::get_lead(&pool, id).await.unwrap().unwrap();
    let second = run_enrichment(&store, &classifier, id).await;
    let after_second = leads::get_lead(&pool, id).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(after_first.sentiment, SentimentStatus::Negative);
    assert_eq!(after_first.sentiment, after_second.sentiment);
    assert_eq!(after_first.sentiment_score, after_second.sentiment_score);
}

#[tokio::test]
async fn test_overlapping_tasks_converge_on_latest_notes() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let classifier = lexicon_classifier();
    let email = "race@example.com";

    // Task A was queued for the first notes, task B for the second; both run
    // only after the second write, in either order
    let id = insert(&pool, email, Some("Terrible experience, awful support")).await;
    edit_notes(&pool, id, email, Some("Wonderful follow-up, very pleased")).await;

    run_enrichment(&store, &classifier, id).await;
    run_enrichment(&store, &classifier, id).await;

    let lead = leads::get_lead(&pool, id).await.unwrap().unwrap();
    assert_eq!(lead.sentiment, SentimentStatus::Positive);
}

#[tokio::test]
async fn test_task_after_notes_cleared_writes_not_analyzed() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let classifier = lexicon_classifier();
    let email = "cleared@example.com";

    let id = insert(&pool, email, Some("Great demo")).await;
    edit_notes(&pool, id, email, None).await;

    let outcome = run_enrichment(&store, &classifier, id).await;
    assert_eq!(outcome, EnrichmentOutcome::Cleared);

    let lead = leads::get_lead(&pool, id).await.unwrap().unwrap();
    assert_eq!(lead.sentiment, SentimentStatus::NotAnalyzed);
    assert_eq!(lead.sentiment_score, None);
}

#[tokio::test]
async fn test_deleted_lead_is_not_resurrected() {
    let pool = setup_db().await;
    let classifier = lexicon_classifier();
    let dispatcher = start_enrichment(pool.clone(), Arc::clone(&classifier), 1).unwrap();

    let id = insert(&pool, "gone@example.com", Some("Love the product")).await;
    assert!(leads::delete_lead(&pool, id).await.unwrap());

    enqueue_enrichment(&dispatcher, id).unwrap();
    wait_for_drain(&dispatcher).await;

    assert!(leads::get_lead(&pool, id).await.unwrap().is_none());
    assert!(leads::list_leads(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_whitespace_notes_never_reach_the_model() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let loader = Arc::new(InstrumentedLoader::new(Duration::ZERO, Duration::ZERO));
    let calls = Arc::clone(&loader.calls);
    let classifier = SentimentClassifier::new(loader, 512);

    let id = insert(&pool, "blank@example.com", Some(" \t\n ")).await;
    run_enrichment(&store, &classifier, id).await;

    let classification = classifier.classify("   ").await;
    assert_eq!(classification.label, None);
    assert_eq!(classification.score, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!classifier.is_loaded());
}

#[tokio::test]
async fn test_concurrent_first_use_loads_model_once() {
    let loader = Arc::new(InstrumentedLoader::new(
        Duration::from_millis(50),
        Duration::ZERO,
    ));
    let loads = Arc::clone(&loader.loads);
    let classifier = Arc::new(SentimentClassifier::new(loader, 512));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            tokio::spawn(async move { classifier.classify("Brilliant, thanks").await })
        })
        .collect();

    for handle in handles {
        let classification = handle.await.unwrap();
        assert_eq!(
            classification.label.map(|l| l.into_status()),
            Some(SentimentStatus::Positive)
        );
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(classifier.is_loaded());
    assert_eq!(
        classifier.model_name().as_deref(),
        Some("instrumented-lexicon")
    );
}

#[tokio::test]
async fn test_failed_model_load_degrades_and_retries() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let classifier = SentimentClassifier::new(Arc::new(FailingLoader), 512);

    assert!(classifier.warm_up().await.is_err());

    let id = insert(&pool, "fail@example.com", Some("Happy customer")).await;
    let outcome = run_enrichment(&store, &classifier, id).await;
    assert_eq!(
        outcome,
        EnrichmentOutcome::Classified {
            sentiment: SentimentStatus::NotAnalyzed,
            score: None,
        }
    );
    assert!(!classifier.is_loaded());

    let lead = leads::get_lead(&pool, id).await.unwrap().unwrap();
    assert_eq!(lead.sentiment, SentimentStatus::NotAnalyzed);
}

#[tokio::test]
async fn test_long_notes_are_classified() {
    let pool = setup_db().await;
    let store = SqliteLeadStore::new(pool.clone());
    let classifier = SentimentClassifier::new(
        Arc::new(InstrumentedLoader::new(Duration::ZERO, Duration::ZERO)),
        16,
    );

    // Only the first 16 characters reach the model
    let notes = format!("Excellent call. {}", "terrible ".repeat(200));
    let id = insert(&pool, "long@example.com", Some(&notes)).await;
    run_enrichment(&store, &classifier, id).await;

    let lead = leads::get_lead(&pool, id).await.unwrap().unwrap();
    assert_eq!(lead.sentiment, SentimentStatus::Positive);
}

#[tokio::test]
async fn test_dispatcher_bounds_concurrent_classifications() {
    let pool = setup_db().await;
    let loader = Arc::new(InstrumentedLoader::new(
        Duration::ZERO,
        Duration::from_millis(30),
    ));
    let max_running = Arc::clone(&loader.max_running);
    let calls = Arc::clone(&loader.calls);
    let classifier = Arc::new(SentimentClassifier::new(loader, 512));
    let dispatcher = start_enrichment(pool.clone(), classifier, 2).unwrap();

    let mut ids = Vec::new();
    for i in 0..6 {
        let id = insert(&pool, &format!("w{}@example.com", i), Some("Good call")).await;
        enqueue_enrichment(&dispatcher, id).unwrap();
        ids.push(id);
    }

    for id in ids {
        let lead = wait_until_settled(&pool, id).await;
        assert_eq!(lead.sentiment, SentimentStatus::Positive);
    }
    wait_for_drain(&dispatcher).await;

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(max_running.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_pipeline_on_file_backed_pool() {
    let dir = tempfile::tempdir().unwrap();
    let pool = crm_common::db::init_database_pool(&dir.path().join("crm.db"))
        .await
        .unwrap();
    let dispatcher = start_enrichment(pool.clone(), lexicon_classifier(), 4).unwrap();

    let mut ids = Vec::new();
    for i in 0..8 {
        let notes = if i % 2 == 0 { "Fantastic demo" } else { "Awful pricing" };
        let id = insert(&pool, &format!("file{}@example.com", i), Some(notes)).await;
        enqueue_enrichment(&dispatcher, id).unwrap();
        ids.push((i, id));
    }

    for (i, id) in ids {
        let lead = wait_until_settled(&pool, id).await;
        let expected = if i % 2 == 0 {
            SentimentStatus::Positive
        } else {
            SentimentStatus::Negative
        };
        assert_eq!(lead.sentiment, expected);
    }
}
