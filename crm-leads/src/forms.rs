//! Lead form parsing and validation

use crm_common::db::{LeadFields, LEAD_STATUSES};
use serde::Deserialize;

/// Lead form as submitted; every field optional so validation can report all problems
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Normalize form input: trim everything, lower-case the email, default the status
pub fn parse_lead_form(form: &LeadForm) -> LeadFields {
    let status = trimmed(form.status.as_deref());
    LeadFields {
        name: trimmed(form.name.as_deref()),
        email: trimmed(form.email.as_deref()).to_lowercase(),
        phone: non_empty(trimmed(form.phone.as_deref())),
        status: if status.is_empty() {
            LEAD_STATUSES[0].to_string()
        } else {
            status
        },
        notes: non_empty(trimmed(form.notes.as_deref())),
    }
}

/// Validation messages; empty when the lead is acceptable
pub fn validate_lead_form(fields: &LeadFields) -> Vec<String> {
    let mut errors = Vec::new();
    if fields.name.is_empty() {
        errors.push("Name is required.".to_string());
    }
    if fields.email.is_empty() {
        errors.push("Email is required.".to_string());
    }
    if !LEAD_STATUSES.contains(&fields.status.as_str()) {
        errors.push("Status must be a valid option.".to_string());
    }
    errors
}
