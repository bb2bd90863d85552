//! HTTP API handlers for crm-leads

pub mod health;
pub mod leads;
pub mod status;

pub use health::health_routes;
pub use leads::lead_routes;
pub use status::{parse_id_list, status_routes};
