//! Consent validation.
//!
//! Only the most recent acceptance of a consent type counts. It must match
//! the required document version, when one is given, and be younger than a
//! year.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ConsentRecord, ConsentType};

pub const CONSENT_MAX_AGE_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsentCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }
}

pub fn latest_of_type(
    consents: &[ConsentRecord],
    consent_type: ConsentType,
) -> Option<&ConsentRecord> {
    consents
        .iter()
        .filter(|c| c.consent_type == consent_type)
        .max_by_key(|c| c.accepted_at)
}

pub fn validate(
    consents: &[ConsentRecord],
    consent_type: ConsentType,
    required_version: Option<&str>,
    now: DateTime<Utc>,
) -> ConsentCheck {
    let Some(latest) = latest_of_type(consents, consent_type) else {
        return ConsentCheck::fail(format!("Missing {} consent", consent_type));
    };

    if let Some(required) = required_version.filter(|v| !v.is_empty()) {
        if latest.document_version != required {
            return ConsentCheck::fail(format!(
                "Outdated {} consent (current: {}, required: {})",
                consent_type, latest.document_version, required
            ));
        }
    }

    if now - latest.accepted_at > Duration::days(CONSENT_MAX_AGE_DAYS) {
        return ConsentCheck::fail(format!(
            "Expired {} consent (accepted more than {} days ago)",
            consent_type, CONSENT_MAX_AGE_DAYS
        ));
    }

    ConsentCheck::ok()
}
