//! # CRM Common Library
//!
//! Shared code for the CRM services:
//! - Lead record model and sentiment status vocabulary
//! - SQLite schema and lead queries
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
