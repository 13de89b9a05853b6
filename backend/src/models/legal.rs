//! Consent records and tamper-evident evidence events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ConsentId, EvidenceId, ParseEnumError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentType {
    Terms,
    Privacy,
    Reservation,
    Activation,
    OfferAcceptance,
    Marketing,
}

impl ConsentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentType::Terms => "terms",
            ConsentType::Privacy => "privacy",
            ConsentType::Reservation => "reservation",
            ConsentType::Activation => "activation",
            ConsentType::OfferAcceptance => "offer_acceptance",
            ConsentType::Marketing => "marketing",
        }
    }
}

impl fmt::Display for ConsentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terms" => Ok(ConsentType::Terms),
            "privacy" => Ok(ConsentType::Privacy),
            "reservation" => Ok(ConsentType::Reservation),
            "activation" => Ok(ConsentType::Activation),
            "offer_acceptance" => Ok(ConsentType::OfferAcceptance),
            "marketing" => Ok(ConsentType::Marketing),
            _ => Err(ParseEnumError::new("consent type", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: ConsentId,
    pub user_id: UserId,
    pub consent_type: ConsentType,
    pub document_version: String,
    pub accepted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub evidence_hash: String,
}

/// An auditable business event before canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEvent {
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub actor_role: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub document_version: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A stored evidence event: the exact canonical JSON that was hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: EvidenceId,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub canonical_json: String,
    pub hash_sha256: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
