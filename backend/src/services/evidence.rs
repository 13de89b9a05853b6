//! Tamper-evident evidence log.
//!
//! Events are reduced to a canonical JSON document (sorted keys, no
//! whitespace, scalar payload values as strings) and hashed with SHA-256.
//! The stored canonical text is what gets re-hashed on verification.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::{EvidenceEvent, EvidenceId, EvidenceRecord};

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            // Output must not depend on serde_json's preserve_order feature.
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Top-level payload normalisation: numbers and booleans become strings,
/// nulls are dropped.
fn normalize_payload(payload: &Map<String, Value>) -> Value {
    let normalized: Map<String, Value> = payload
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => other.clone(),
            };
            Some((key.clone(), value))
        })
        .collect();
    sort_keys(Value::Object(normalized))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub canonical: Value,
    pub canonical_json: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub fn canonicalize(event: &EvidenceEvent, timestamp: DateTime<Utc>) -> CanonicalEvent {
    let mut envelope = Map::new();
    envelope.insert("event_type".into(), Value::String(event.event_type.clone()));
    envelope.insert("entity_type".into(), Value::String(event.entity_type.clone()));
    envelope.insert("entity_id".into(), Value::String(event.entity_id.clone()));
    envelope.insert(
        "user_id".into(),
        event.user_id.clone().map_or(Value::Null, Value::String),
    );
    envelope.insert(
        "actor_role".into(),
        event.actor_role.clone().map_or(Value::Null, Value::String),
    );
    envelope.insert(
        "timestamp".into(),
        Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    envelope.insert("payload".into(), normalize_payload(&event.payload));
    if let Some(version) = event.document_version.as_ref().filter(|v| !v.is_empty()) {
        envelope.insert("document_version".into(), Value::String(version.clone()));
    }

    let canonical = sort_keys(Value::Object(envelope));
    let canonical_json = canonical.to_string();
    let hash = sha256_hex(&canonical_json);
    CanonicalEvent {
        canonical,
        canonical_json,
        hash,
        timestamp,
    }
}

pub fn to_record(event: &EvidenceEvent, canonical: &CanonicalEvent) -> EvidenceRecord {
    EvidenceRecord {
        id: EvidenceId::generate(),
        event_type: event.event_type.clone(),
        entity_type: event.entity_type.clone(),
        entity_id: event.entity_id.clone(),
        canonical_json: canonical.canonical_json.clone(),
        hash_sha256: canonical.hash.clone(),
        ip_address: event.ip_address.clone(),
        user_agent: event.user_agent.clone(),
        recorded_at: canonical.timestamp,
    }
}

pub fn verify_integrity(canonical_json: &str, stored_hash: &str) -> bool {
    sha256_hex(canonical_json).eq_ignore_ascii_case(stored_hash)
}
