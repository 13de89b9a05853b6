//! Customer testimonials moderated before they are shown publicly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ParseEnumError, TestimonialId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestimonialStatus {
    Pending,
    Approved,
    Rejected,
}

impl TestimonialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestimonialStatus::Pending => "pending",
            TestimonialStatus::Approved => "approved",
            TestimonialStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for TestimonialStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TestimonialStatus::Pending),
            "approved" => Ok(TestimonialStatus::Approved),
            "rejected" => Ok(TestimonialStatus::Rejected),
            _ => Err(ParseEnumError::new("testimonial status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: TestimonialId,
    pub user_name: String,
    pub user_email: String,
    pub user_city: Option<String>,
    pub certificate_type: Option<String>,
    /// 1..=5 stars.
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub would_recommend: bool,
    pub status: TestimonialStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
