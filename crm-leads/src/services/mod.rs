//! Enrichment pipeline services

pub mod classifier;
pub mod dispatcher;
pub mod enrichment;
pub mod model;

pub use classifier::{Classification, SentimentClassifier, SentimentLabel};
pub use dispatcher::{DispatchError, TaskDispatcher};
pub use enrichment::{
    enqueue_enrichment, run_enrichment, start_enrichment, EnrichmentContext, EnrichmentDispatcher,
    EnrichmentOutcome,
};
pub use model::{ConfiguredModelLoader, ModelError, ModelLoader, SentimentModel};
