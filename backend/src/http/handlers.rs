//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, Sse},
    Json,
};
use chrono::{NaiveDate, Utc};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use super::dto::{
    AttributionRequest, CancelRequest, ChatQuestion, CheckoutRequest, ClientSignals,
    ConsentQuery, ContactForm, CreateProperty, CreateRoleUser, HealthResponse,
    JobStartedResponse, JobStatusResponse, JoinWaitlist, MatchOptions, OfferRequest,
    OxxoPlanRequest, OxxoPlanResponse, PaymentEvent, PurchaseRequest, RecommendQuery,
    RecordConsent, RegisterBroker, RetirementBonusQuery, ReviewTestimonialRequest,
    SubmitReservationRequest, SubmitTestimonial, TestimonialFilter, TestimonialLimit,
    ToggleSalesRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::services as db_services;
use crate::db::services::{
    BrokerCommissions, BrokerLevelView, EvidenceIntegrity, MatchResult, PurchaseReceipt,
    WebhookOutcome,
};
use crate::models::{
    BrokerProfile, CapacitySnapshot, CertificateId, CertificateProduct, ConfirmedReservation,
    ConsentRecord, ConsentType, ContactRequest, EvidenceEvent, EvidenceId, EvidenceRecord,
    Permission, ProductId, PropertyId, ReferralAttribution, RequestId, ReservationRequest,
    SupplyProperty, Testimonial, TestimonialId, UserAccount, UserId, UserRole, WaitlistEntry,
};
use crate::services::bot_detection::{self, BotDetectionResult};
use crate::services::chatbot::{self, ChatAnswer};
use crate::services::commissions::RetirementBonus;
use crate::services::consent::ConsentCheck;
use crate::services::job_tracker::{Job, JobStatus};
use crate::services::lifecycle::Eligibility;
use crate::services::maintenance::{self, MaintenanceTask};
use crate::services::payments::{self, CheckoutOrder};
use crate::services::products::{self, ProductAvailability, Recommendation};
use crate::services::roles::{self, RoleDashboard};
use crate::services::verification::VerificationView;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Result type for handlers that create a resource.
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), AppError>;

fn created<T>(value: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

fn parse_path<T>(raw: &str, what: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid {} '{}': {}", what, raw, e)))
}

/// Header carrying the id of the user calling an admin endpoint.
pub const ACTOR_HEADER: &str = "x-user-id";

fn actor_id(headers: &HeaderMap) -> Result<UserId, AppError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", ACTOR_HEADER)))?;
    raw.parse()
        .map_err(|_| AppError::Unauthorized(format!("Invalid {} header", ACTOR_HEADER)))
}

/// Resolve the acting admin and check `permission`.
async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<UserAccount, AppError> {
    let actor = actor_id(headers)?;
    Ok(db_services::authorize_admin(state.repository.as_ref(), actor, permission).await?)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the repository is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Capacity & Catalog
// =============================================================================

/// GET /v1/capacity/status
pub async fn capacity_status(State(state): State<AppState>) -> HandlerResult<CapacitySnapshot> {
    db_services::latest_capacity(state.repository.as_ref())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No capacity snapshot has been calculated".to_string()))
}

/// POST /v1/capacity/recalculate
pub async fn recalculate_capacity(
    State(state): State<AppState>,
) -> HandlerResult<CapacitySnapshot> {
    let snapshot = db_services::recalculate_capacity(state.repository.as_ref()).await?;
    Ok(Json(snapshot))
}

/// GET /v1/products
pub async fn list_products(State(state): State<AppState>) -> HandlerResult<Vec<CertificateProduct>> {
    let products = db_services::list_active_products(state.repository.as_ref()).await?;
    Ok(Json(products))
}

/// GET /v1/products/recommend?party_size=&stays=
pub async fn recommend_product(
    Query(query): Query<RecommendQuery>,
) -> HandlerResult<Recommendation> {
    if query.party_size == 0 {
        return Err(AppError::BadRequest(
            "party_size must be at least 1".to_string(),
        ));
    }
    Ok(Json(products::recommend_product(query.party_size, query.stays)))
}

/// GET /v1/products/{id}/availability
pub async fn product_availability(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> HandlerResult<ProductAvailability> {
    let product_id: ProductId = parse_path(&product_id, "product id")?;
    let availability =
        db_services::product_availability(state.repository.as_ref(), product_id, state.total_cap())
            .await?;
    Ok(Json(availability))
}

/// POST /v1/waitlist
pub async fn join_waitlist(
    State(state): State<AppState>,
    Json(request): Json<JoinWaitlist>,
) -> CreatedResult<WaitlistEntry> {
    let entry = db_services::join_waitlist(state.repository.as_ref(), request).await?;
    created(entry)
}

// =============================================================================
// Certificates & Reservations
// =============================================================================

/// POST /v1/certificates/purchase
///
/// Issue a certificate with its voucher and pay out referral commissions.
pub async fn purchase_certificate(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> CreatedResult<PurchaseReceipt> {
    let receipt =
        db_services::purchase_certificate(state.repository.as_ref(), request, state.total_cap())
            .await?;
    log::info!(
        "Issued certificate {} with voucher {}",
        receipt.certificate.id,
        receipt.voucher.voucher_code
    );
    created(receipt)
}

/// GET /v1/certificates/{id}/eligibility
pub async fn certificate_eligibility(
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> HandlerResult<Eligibility> {
    let certificate_id: CertificateId = parse_path(&certificate_id, "certificate id")?;
    let eligibility =
        db_services::certificate_eligibility(state.repository.as_ref(), certificate_id, today())
            .await?;
    Ok(Json(eligibility))
}

/// POST /v1/reservations/requests
pub async fn submit_reservation_request(
    State(state): State<AppState>,
    Json(request): Json<SubmitReservationRequest>,
) -> CreatedResult<ReservationRequest> {
    let request =
        db_services::submit_reservation_request(state.repository.as_ref(), request, today())
            .await?;
    created(request)
}

/// POST /v1/reservations/requests/{id}/offer
pub async fn offer_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(body): Json<OfferRequest>,
) -> HandlerResult<ReservationRequest> {
    let request_id: RequestId = parse_path(&request_id, "request id")?;
    let property_id: PropertyId = parse_path(&body.property_id, "property id")?;
    let request =
        db_services::offer_request(state.repository.as_ref(), request_id, property_id).await?;
    Ok(Json(request))
}

/// POST /v1/reservations/requests/{id}/confirm
pub async fn confirm_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> CreatedResult<ConfirmedReservation> {
    let request_id: RequestId = parse_path(&request_id, "request id")?;
    let reservation =
        db_services::confirm_request(state.repository.as_ref(), request_id, today()).await?;
    created(reservation)
}

/// POST /v1/reservations/requests/{id}/cancel
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> HandlerResult<ReservationRequest> {
    let request_id: RequestId = parse_path(&request_id, "request id")?;
    let request =
        db_services::cancel_request(state.repository.as_ref(), request_id, &body.reason).await?;
    Ok(Json(request))
}

/// POST /v1/reservations/match
pub async fn match_properties(
    State(state): State<AppState>,
    Json(options): Json<MatchOptions>,
) -> HandlerResult<MatchResult> {
    let result = db_services::match_properties(state.repository.as_ref(), &options).await?;
    Ok(Json(result))
}

/// GET /v1/verify/{id}
///
/// Public verification by certificate id or voucher code.
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> HandlerResult<VerificationView> {
    let view = db_services::verify_certificate(state.repository.as_ref(), &key).await?;
    Ok(Json(view))
}

// =============================================================================
// Administration
// =============================================================================

/// POST /v1/admin/users
pub async fn admin_create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRoleUser>,
) -> CreatedResult<UserAccount> {
    let actor = actor_id(&headers)?;
    let user = db_services::create_role_user(state.repository.as_ref(), actor, request).await?;
    created(user)
}

/// POST /v1/admin/properties
pub async fn admin_create_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateProperty>,
) -> CreatedResult<SupplyProperty> {
    require_admin(&state, &headers, Permission::ManageProperties).await?;
    let property = db_services::create_property(state.repository.as_ref(), request).await?;
    created(property)
}

/// POST /v1/admin/capacity/toggle-sales
pub async fn admin_toggle_sales(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ToggleSalesRequest>,
) -> HandlerResult<CapacitySnapshot> {
    let admin = require_admin(&state, &headers, Permission::ManageSystem).await?;
    let snapshot =
        db_services::toggle_sales(state.repository.as_ref(), request.tier, request.enabled)
            .await?;
    log::info!(
        "{} set sales of {} to {}",
        admin.email,
        request.tier,
        request.enabled
    );
    Ok(Json(snapshot))
}

/// GET /v1/admin/testimonials?status=
pub async fn admin_list_testimonials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<TestimonialFilter>,
) -> HandlerResult<Vec<Testimonial>> {
    require_admin(&state, &headers, Permission::ManageSystem).await?;
    let testimonials =
        db_services::list_testimonials_admin(state.repository.as_ref(), filter.status).await?;
    Ok(Json(testimonials))
}

/// POST /v1/admin/testimonials/{id}/review
pub async fn admin_review_testimonial(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(testimonial_id): Path<String>,
    Json(body): Json<ReviewTestimonialRequest>,
) -> HandlerResult<Testimonial> {
    let admin = require_admin(&state, &headers, Permission::ManageSystem).await?;
    let testimonial_id: TestimonialId = parse_path(&testimonial_id, "testimonial id")?;
    let testimonial = db_services::review_testimonial(
        state.repository.as_ref(),
        admin.id,
        testimonial_id,
        body.status,
        body.admin_notes,
    )
    .await?;
    Ok(Json(testimonial))
}

// =============================================================================
// Testimonials
// =============================================================================

/// POST /v1/testimonials
pub async fn submit_testimonial(
    State(state): State<AppState>,
    Json(request): Json<SubmitTestimonial>,
) -> CreatedResult<Testimonial> {
    let testimonial = db_services::submit_testimonial(state.repository.as_ref(), request).await?;
    created(testimonial)
}

/// GET /v1/testimonials?limit=
pub async fn list_testimonials(
    State(state): State<AppState>,
    Query(query): Query<TestimonialLimit>,
) -> HandlerResult<Vec<Testimonial>> {
    let testimonials =
        db_services::list_public_testimonials(state.repository.as_ref(), query.limit).await?;
    Ok(Json(testimonials))
}

// =============================================================================
// Brokers & Referrals
// =============================================================================

/// POST /v1/brokers
pub async fn register_broker(
    State(state): State<AppState>,
    Json(request): Json<RegisterBroker>,
) -> CreatedResult<BrokerProfile> {
    let profile = db_services::register_broker(state.repository.as_ref(), request).await?;
    created(profile)
}

/// GET /v1/brokers/{id}/level
pub async fn broker_level(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
) -> HandlerResult<BrokerLevelView> {
    let broker_id: UserId = parse_path(&broker_id, "broker id")?;
    let view = db_services::broker_level_view(state.repository.as_ref(), broker_id).await?;
    Ok(Json(view))
}

/// GET /v1/brokers/{id}/commissions
pub async fn broker_commissions(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
) -> HandlerResult<BrokerCommissions> {
    let broker_id: UserId = parse_path(&broker_id, "broker id")?;
    let commissions = db_services::broker_commissions(state.repository.as_ref(), broker_id).await?;
    Ok(Json(commissions))
}

/// GET /v1/brokers/{id}/retirement-bonus?sale_price_usd=
pub async fn broker_retirement_bonus(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    Query(query): Query<RetirementBonusQuery>,
) -> HandlerResult<RetirementBonus> {
    let broker_id: UserId = parse_path(&broker_id, "broker id")?;
    let bonus = db_services::broker_retirement_bonus(
        state.repository.as_ref(),
        broker_id,
        query.sale_price_usd,
    )
    .await?;
    Ok(Json(bonus))
}

/// POST /v1/referrals/attributions
pub async fn create_attribution(
    State(state): State<AppState>,
    Json(request): Json<AttributionRequest>,
) -> CreatedResult<ReferralAttribution> {
    let attribution = db_services::create_attribution(
        state.repository.as_ref(),
        &request.referral_code,
        request.lead_email,
        request.lead_user_id,
    )
    .await?;
    created(attribution)
}

// =============================================================================
// Legal & Compliance
// =============================================================================

/// POST /v1/consents
pub async fn record_consent(
    State(state): State<AppState>,
    Json(request): Json<RecordConsent>,
) -> CreatedResult<ConsentRecord> {
    let record = db_services::record_consent(state.repository.as_ref(), request).await?;
    created(record)
}

/// GET /v1/users/{id}/consents/{type}?version=
pub async fn check_consent(
    State(state): State<AppState>,
    Path((user_id, consent_type)): Path<(String, String)>,
    Query(query): Query<ConsentQuery>,
) -> HandlerResult<ConsentCheck> {
    let user_id: UserId = parse_path(&user_id, "user id")?;
    let consent_type: ConsentType = parse_path(&consent_type, "consent type")?;
    let check = db_services::check_consent(
        state.repository.as_ref(),
        user_id,
        consent_type,
        query.version.as_deref(),
    )
    .await?;
    Ok(Json(check))
}

/// POST /v1/evidence
pub async fn log_evidence(
    State(state): State<AppState>,
    Json(event): Json<EvidenceEvent>,
) -> CreatedResult<EvidenceRecord> {
    let record = db_services::log_evidence(state.repository.as_ref(), event).await?;
    created(record)
}

/// GET /v1/evidence/{id}/verify
pub async fn verify_evidence(
    State(state): State<AppState>,
    Path(evidence_id): Path<String>,
) -> HandlerResult<EvidenceIntegrity> {
    let evidence_id: EvidenceId = parse_path(&evidence_id, "evidence id")?;
    let integrity = db_services::verify_evidence(state.repository.as_ref(), evidence_id).await?;
    Ok(Json(integrity))
}

/// POST /v1/contact
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> CreatedResult<ContactRequest> {
    let request = db_services::submit_contact(state.repository.as_ref(), form).await?;
    created(request)
}

/// GET /v1/contact
pub async fn list_contacts(State(state): State<AppState>) -> HandlerResult<Vec<ContactRequest>> {
    let requests = state.repository.list_contact_requests().await?;
    Ok(Json(requests))
}

/// POST /v1/compliance/bot-check
pub async fn bot_check(Json(signals): Json<ClientSignals>) -> HandlerResult<BotDetectionResult> {
    let result = bot_detection::detect(&signals);
    if result.is_bot {
        log::warn!(
            "Bot signals detected (score {}): {}",
            result.score,
            result.reasons.join(", ")
        );
    }
    Ok(Json(result))
}

// =============================================================================
// Payments
// =============================================================================

/// POST /v1/payments/checkout
pub async fn create_checkout(Json(request): Json<CheckoutRequest>) -> CreatedResult<CheckoutOrder> {
    let order = payments::create_checkout_order(&request)?;
    created(order)
}

/// POST /v1/webhooks/conekta
///
/// Processor events; unknown orders and event types are acknowledged.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<PaymentEvent>,
) -> HandlerResult<WebhookOutcome> {
    let outcome = db_services::handle_payment_event(state.repository.as_ref(), event).await?;
    Ok(Json(outcome))
}

/// POST /v1/payments/oxxo/plan
pub async fn oxxo_plan(Json(request): Json<OxxoPlanRequest>) -> HandlerResult<OxxoPlanResponse> {
    let plan = payments::oxxo_partial_payments(request.amount_mxn)?;
    let total = plan.len() as u32;
    Ok(Json(OxxoPlanResponse {
        requires_partial_payments: payments::requires_partial_payments(request.amount_mxn),
        message: payments::partial_payment_message(&plan),
        progress: payments::payment_progress(request.completed.min(total), total),
        payments: plan,
    }))
}

// =============================================================================
// Assistant & Roles
// =============================================================================

/// POST /v1/chatbot/ask
pub async fn chatbot_ask(Json(question): Json<ChatQuestion>) -> HandlerResult<ChatAnswer> {
    Ok(Json(chatbot::ask(&question.query)))
}

/// GET /v1/chatbot/quick-actions
pub async fn chatbot_quick_actions() -> HandlerResult<serde_json::Value> {
    Ok(Json(json!({
        "welcome": chatbot::WELCOME_MESSAGE,
        "actions": chatbot::QUICK_ACTIONS,
    })))
}

/// GET /v1/roles/{role}/dashboard
pub async fn role_dashboard(Path(role): Path<String>) -> HandlerResult<RoleDashboard> {
    let role: UserRole = parse_path(&role, "role")?;
    Ok(Json(roles::describe(role)))
}

// =============================================================================
// Maintenance Jobs
// =============================================================================

/// POST /v1/maintenance/{task}
///
/// Start a maintenance task in the background. Returns a job ID for tracking progress.
pub async fn start_maintenance(
    State(state): State<AppState>,
    Path(task): Path<String>,
) -> Result<(StatusCode, Json<JobStartedResponse>), AppError> {
    let task: MaintenanceTask = parse_path(&task, "maintenance task")?;
    let job_id = maintenance::spawn_task(
        state.repository.clone(),
        state.job_tracker.clone(),
        task,
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(JobStartedResponse {
            job_id,
            task: task.as_str().to_string(),
            message: format!("{} started. Use job_id to track progress.", task),
        }),
    ))
}

/// GET /v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> HandlerResult<Vec<Job>> {
    Ok(Json(state.job_tracker.list_jobs()))
}

/// GET /v1/jobs/{job_id}
///
/// Get the current status and logs of a background job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .job_tracker
        .get_job(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    let status = serde_json::to_value(job.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        task: job.task,
        status,
        logs: job.logs,
        result: job.result,
    }))
}

/// GET /v1/jobs/{job_id}/logs
///
/// Stream job logs via Server-Sent Events (SSE).
pub async fn stream_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if state.job_tracker.get_job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("Job {} not found", job_id)));
    }

    let tracker = state.job_tracker.clone();
    let stream = async_stream::stream! {
        let mut sent = 0;
        loop {
            let logs = tracker.get_logs(&job_id);
            for entry in logs.iter().skip(sent) {
                let data = serde_json::to_string(entry).unwrap_or_default();
                yield Ok(Event::default().data(data));
            }
            sent = logs.len();

            match tracker.get_job(&job_id) {
                Some(job) if job.status != JobStatus::Running => {
                    let final_event = json!({
                        "status": job.status,
                        "result": job.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
                Some(_) => {}
                None => break,
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream))
}
