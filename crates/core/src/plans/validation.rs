//! Structural validation of inbound plan payloads.
//!
//! Gates run in order and each is final: byte ceiling on the raw body, JSON
//! syntax, top-level object, then per-collection shape. Structural violations are
//! collected together so the client gets every problem in one message.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use super::plans_model::PlanDocument;

/// Hard ceiling on a serialized plan (1 MiB).
pub const MAX_PLAN_BYTES: usize = 1024 * 1024;

/// Array fields every plan carries, defaulted to `[]` when absent.
pub const COLLECTION_FIELDS: [&str; 5] = [
    "periods",
    "transactions",
    "incomeRules",
    "outflowRules",
    "bills",
];

pub const TRANSACTION_TYPES: [&str; 3] = ["income", "outflow", "transfer"];

const MAX_ID_CHARS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("Plan payload too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl PlanValidationError {
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Invalid(violations) => violations,
            _ => &[],
        }
    }
}

/// Validates a raw request body. Size is checked before any parsing work.
pub fn validate_plan_bytes(raw: &[u8]) -> Result<PlanDocument, PlanValidationError> {
    if raw.len() > MAX_PLAN_BYTES {
        return Err(PlanValidationError::TooLarge {
            size: raw.len(),
            limit: MAX_PLAN_BYTES,
        });
    }
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| PlanValidationError::InvalidJson(e.to_string()))?;
    validate_structure(value)
}

/// Validates an already parsed value (e.g. the result of a partial merge).
pub fn validate_plan_value(value: Value) -> Result<PlanDocument, PlanValidationError> {
    let size = serde_json::to_vec(&value)
        .map_err(|e| PlanValidationError::InvalidJson(e.to_string()))?
        .len();
    if size > MAX_PLAN_BYTES {
        return Err(PlanValidationError::TooLarge {
            size,
            limit: MAX_PLAN_BYTES,
        });
    }
    validate_structure(value)
}

fn validate_structure(value: Value) -> Result<PlanDocument, PlanValidationError> {
    let Value::Object(mut map) = value else {
        return Err(PlanValidationError::Invalid(vec![
            "plan must be a JSON object".to_string(),
        ]));
    };

    let mut violations = Vec::new();
    for field in COLLECTION_FIELDS {
        match map.get(field) {
            None => {
                map.insert(field.to_string(), Value::Array(Vec::new()));
            }
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    check_entry(field, index, item, &mut violations);
                }
            }
            Some(_) => violations.push(format!("{} must be an array", field)),
        }
    }

    if let Some(overrides) = map.get("overrides") {
        if !overrides.is_object() {
            violations.push("overrides must be an object".to_string());
        }
    }

    if violations.is_empty() {
        Ok(PlanDocument::from_validated(map))
    } else {
        Err(PlanValidationError::Invalid(violations))
    }
}

fn check_entry(field: &str, index: usize, item: &Value, violations: &mut Vec<String>) {
    let Some(entry) = item.as_object() else {
        violations.push(format!("{}[{}] must be an object", field, index));
        return;
    };

    check_id(field, index, entry, violations);

    if field == "transactions" {
        check_transaction(index, entry, violations);
    }
}

fn check_id(field: &str, index: usize, entry: &Map<String, Value>, violations: &mut Vec<String>) {
    match entry.get("id") {
        Some(Value::String(id)) if id.trim().is_empty() => {
            violations.push(format!("{}[{}].id is required", field, index));
        }
        Some(Value::String(id)) if id.chars().count() > MAX_ID_CHARS => {
            violations.push(format!(
                "{}[{}].id exceeds {} characters",
                field, index, MAX_ID_CHARS
            ));
        }
        Some(Value::String(_)) | Some(Value::Number(_)) => {}
        None | Some(Value::Null) => {
            violations.push(format!("{}[{}].id is required", field, index));
        }
        Some(_) => {
            violations.push(format!(
                "{}[{}].id must be a string or number",
                field, index
            ));
        }
    }
}

fn check_transaction(index: usize, entry: &Map<String, Value>, violations: &mut Vec<String>) {
    match entry.get("date") {
        None | Some(Value::Null) => {
            violations.push(format!("transactions[{}].date is required", index));
        }
        Some(Value::String(date)) if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() => {}
        Some(_) => violations.push(format!(
            "transactions[{}].date must be a YYYY-MM-DD date",
            index
        )),
    }

    match entry.get("amount") {
        None | Some(Value::Null) => {
            violations.push(format!("transactions[{}].amount is required", index));
        }
        Some(Value::Number(_)) => {}
        Some(_) => violations.push(format!("transactions[{}].amount must be a number", index)),
    }

    match entry.get("type") {
        None | Some(Value::Null) => {
            violations.push(format!("transactions[{}].type is required", index));
        }
        Some(Value::String(kind)) if TRANSACTION_TYPES.contains(&kind.as_str()) => {}
        Some(_) => violations.push(format!(
            "transactions[{}].type must be one of {}",
            index,
            TRANSACTION_TYPES.join(", ")
        )),
    }
}
