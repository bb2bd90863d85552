//! Database models and queries

pub mod init;
pub mod leads;
pub mod models;

pub use init::{create_leads_table, init_database_pool};
pub use models::{Lead, LeadFields, SentimentStatus, LEAD_STATUSES};
