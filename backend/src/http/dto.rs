//! Data Transfer Objects for the HTTP API.
//!
//! Request bodies that map one-to-one onto a service call reuse the service
//! types (`PurchaseRequest`, `ContactForm`, ...); the types here cover the
//! remaining shapes.

use serde::{Deserialize, Serialize};

use crate::models::{CertificateTier, TestimonialStatus, UserId};
use crate::services::job_tracker::LogEntry;
use crate::services::payments::{PartialPayment, PaymentProgress};

pub use crate::db::services::{
    ContactForm, CreateProperty, CreateRoleUser, JoinWaitlist, PaymentEvent, PurchaseRequest,
    RecordConsent, RegisterBroker, SubmitReservationRequest, SubmitTestimonial,
};
pub use crate::services::bot_detection::ClientSignals;
pub use crate::services::matcher::MatchOptions;
pub use crate::services::payments::CheckoutRequest;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Query for `GET /v1/products/recommend`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendQuery {
    pub party_size: u32,
    pub stays: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetirementBonusQuery {
    pub sale_price_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionRequest {
    pub referral_code: String,
    #[serde(default)]
    pub lead_email: Option<String>,
    #[serde(default)]
    pub lead_user_id: Option<UserId>,
}

/// Query for the consent validity check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsentQuery {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferRequest {
    pub property_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuestion {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OxxoPlanRequest {
    pub amount_mxn: f64,
    /// Installments already paid, for the progress block.
    #[serde(default)]
    pub completed: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OxxoPlanResponse {
    pub requires_partial_payments: bool,
    pub payments: Vec<PartialPayment>,
    pub message: String,
    pub progress: PaymentProgress,
}

/// Response for maintenance job creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStartedResponse {
    pub job_id: String,
    pub task: String,
    pub message: String,
}

/// Job status response for async processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub task: String,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleSalesRequest {
    pub tier: CertificateTier,
    pub enabled: bool,
}

/// Query for the admin testimonial list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestimonialFilter {
    #[serde(default)]
    pub status: Option<TestimonialStatus>,
}

/// Query for the public testimonial list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestimonialLimit {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewTestimonialRequest {
    pub status: TestimonialStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}
