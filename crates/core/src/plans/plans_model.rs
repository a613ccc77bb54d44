//! Plan document and stored record models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::tokens::{SessionToken, TokenHash};

use super::validation::COLLECTION_FIELDS;

/// Opaque plan JSON object. Only its minimal shape is ever inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanDocument(Map<String, Value>);

impl PlanDocument {
    /// The document a brand new session starts with.
    pub fn blank() -> Self {
        let mut map = Map::new();
        for field in COLLECTION_FIELDS {
            map.insert(field.to_string(), Value::Array(Vec::new()));
        }
        map.insert("overrides".to_string(), Value::Object(Map::new()));
        Self(map)
    }

    /// Wraps an already validated object.
    pub(crate) fn from_validated(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Rehydrates a document written by this service. Stored JSON was validated on
    /// the way in, so only syntax is checked.
    pub fn from_stored(json: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// No periods, rules, bills or transactions.
    pub fn is_blank(&self) -> bool {
        COLLECTION_FIELDS.iter().all(|field| match self.0.get(*field) {
            None => true,
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// One live row of a plan family table.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub token_hash: TokenHash,
    pub plan: PlanDocument,
    pub prev_plan: Option<PlanDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Result of a bootstrap: a usable token and the state it addresses.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub token: SessionToken,
    pub plan: PlanDocument,
    pub prev_plan: Option<PlanDocument>,
    pub updated_at: DateTime<Utc>,
    pub is_new: bool,
}

/// Canonical timestamp encoding for storage and the wire. Fixed width, UTC, so
/// lexical order is chronological order.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_document_has_empty_collections() {
        let blank = PlanDocument::blank();
        assert!(blank.is_blank());
        for field in COLLECTION_FIELDS {
            assert_eq!(blank.get(field), Some(&json!([])));
        }
        assert_eq!(blank.get("overrides"), Some(&json!({})));
    }

    #[test]
    fn document_with_a_transaction_is_not_blank() {
        let mut map = PlanDocument::blank().as_map().clone();
        map.insert(
            "transactions".to_string(),
            json!([{ "id": "txn-1", "date": "2025-12-22", "amount": 12.5, "type": "outflow" }]),
        );
        assert!(!PlanDocument::from_validated(map).is_blank());
    }

    #[test]
    fn stored_round_trip_preserves_unknown_fields() {
        let stored = r#"{"periods":[],"theme":"dark","x-ext":{"a":1}}"#;
        let doc = PlanDocument::from_stored(stored).expect("parse");
        assert_eq!(doc.get("theme"), Some(&json!("dark")));
        let again = PlanDocument::from_stored(&doc.to_json_string().expect("encode")).expect("parse");
        assert_eq!(doc, again);
    }

    #[test]
    fn timestamps_are_fixed_width_utc() {
        let ts = chrono::DateTime::parse_from_rfc3339("2026-01-01T01:00:00+01:00")
            .expect("parse")
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(ts), "2026-01-01T00:00:00.000Z");
    }
}
