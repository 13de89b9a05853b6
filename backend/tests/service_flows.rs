//! End-to-end service flows against the in-memory repository.

mod support;

use chrono::{Datelike, Duration, Utc};
use std::sync::Arc;
use weekchain::db::repository::FullRepository;
use weekchain::db::services::{
    self, ContactForm, CreateProperty, CreateRoleUser, PaymentEvent, PaymentEventData,
    PaymentEventObject, PurchaseRequest, RecordConsent, SubmitReservationRequest,
    SubmitTestimonial,
};
use weekchain::models::{
    CertificateId, CertificateStatus, CertificateTier, ConsentType, EvidenceEvent, PaxCategory,
    PaymentMethod, PaymentStatus, PropertyCategory, PropertyId, PropertyStatus, ReferralEdge,
    ReservationRequestStatus, SeasonalPricing, SupplyProperty, TestimonialStatus, UserId,
    UserRole, VoucherStatus,
};
use weekchain::services::job_tracker::JobStatus;
use weekchain::services::maintenance::{self, MaintenanceTask};
use weekchain::services::matcher::MatchOptions;
use weekchain::services::{DomainError, JobTracker};

use support::{create_broker, create_property, create_role_user, create_user, seeded_repo, spec};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

async fn buy(
    repo: &dyn FullRepository,
    user_id: UserId,
    max_pax: PaxCategory,
    estancias: u8,
    referral_code: Option<&str>,
    total_cap: u32,
) -> Result<services::PurchaseReceipt, DomainError> {
    buy_with(
        repo,
        user_id,
        max_pax,
        estancias,
        referral_code,
        total_cap,
        PaymentMethod::Card,
    )
    .await
}

async fn buy_with(
    repo: &dyn FullRepository,
    user_id: UserId,
    max_pax: PaxCategory,
    estancias: u8,
    referral_code: Option<&str>,
    total_cap: u32,
    payment_method: PaymentMethod,
) -> Result<services::PurchaseReceipt, DomainError> {
    let product = repo
        .find_product_by_spec(spec(max_pax, estancias))
        .await
        .unwrap()
        .expect("catalog product");
    let user = repo.get_user(user_id).await.unwrap();
    services::purchase_certificate(
        repo,
        PurchaseRequest {
            user_id,
            product_id: product.id,
            holder_name: user.full_name.clone(),
            holder_email: user.email.clone(),
            wallet_address: None,
            payment_method,
            payment_reference: None,
            referral_code: referral_code.map(str::to_string),
        },
        total_cap,
    )
    .await
}

fn order_event(event_type: &str, order_id: &str) -> PaymentEvent {
    PaymentEvent {
        event_type: event_type.to_string(),
        data: PaymentEventData {
            object: PaymentEventObject {
                id: order_id.to_string(),
                amount: None,
            },
        },
    }
}

async fn accept_reservation_terms(repo: &dyn FullRepository, user_id: UserId) {
    services::record_consent(
        repo,
        RecordConsent {
            user_id,
            consent_type: ConsentType::Reservation,
            document_version: "v1".to_string(),
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some("tests".to_string()),
        },
    )
    .await
    .unwrap();
}

// =========================================================
// Purchases & commissions
// =========================================================

#[tokio::test]
async fn test_referral_purchase_pays_three_levels() {
    let repo = seeded_repo().await;
    let top = create_broker(repo.as_ref(), "top@week-chain.com", "TOP-01").await;
    let mid = create_broker(repo.as_ref(), "mid@week-chain.com", "MID-01").await;
    let low = create_broker(repo.as_ref(), "low@week-chain.com", "LOW-01").await;
    repo.insert_referral_edges(&[
        ReferralEdge {
            broker_id: top,
            referred_user_id: mid,
            level: 1,
        },
        ReferralEdge {
            broker_id: mid,
            referred_user_id: low,
            level: 1,
        },
        ReferralEdge {
            broker_id: top,
            referred_user_id: low,
            level: 2,
        },
    ])
    .await
    .unwrap();

    let buyer = create_user(repo.as_ref(), "ana@example.com", "Ana López").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Two, 1, Some("low-01"), 68)
        .await
        .unwrap();

    assert_eq!(receipt.commissions.len(), 3);
    let by_broker = |id: UserId| {
        receipt
            .commissions
            .iter()
            .find(|c| c.broker_id == id)
            .map(|c| c.amount_usd)
            .unwrap()
    };
    assert!(approx(by_broker(low), 140.0));
    assert!(approx(by_broker(mid), 35.0));
    assert!(approx(by_broker(top), 17.5));

    let chain = repo.referral_chain(buyer).await.unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].broker_id, low);

    let low_view = services::broker_commissions(repo.as_ref(), low).await.unwrap();
    assert!(approx(low_view.totals.pending, 140.0));
    assert!(approx(low_view.totals.total, 140.0));

    let level = services::broker_level_view(repo.as_ref(), low).await.unwrap();
    assert_eq!(level.profile.total_weeks_sold, 1);
    assert_eq!(repo.get_user(low).await.unwrap().referrals_this_month, 1);
}

#[tokio::test]
async fn test_purchase_without_referral_has_no_commissions() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "solo@example.com", "Solo Buyer").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Four, 2, None, 68)
        .await
        .unwrap();

    assert!(receipt.commissions.is_empty());
    assert_eq!(receipt.certificate.weeks_per_year, 2);
    assert_eq!(receipt.voucher.payment_amount_cents, 900_000);
    assert!(receipt.voucher.voucher_code.starts_with("WC-"));

    let product = repo
        .find_product_by_spec(spec(PaxCategory::Four, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.sold_count, 1);
}

#[tokio::test]
async fn test_invalid_referral_code_is_ignored() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "lead@example.com", "Lead Person").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Two, 1, Some("NOPE-99"), 68)
        .await
        .unwrap();
    assert!(receipt.commissions.is_empty());
    assert!(repo.referral_chain(buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_product_cap_blocks_second_sale() {
    let repo = seeded_repo().await;
    let first = create_user(repo.as_ref(), "first@example.com", "First Buyer").await;
    let second = create_user(repo.as_ref(), "second@example.com", "Second Buyer").await;

    // 8 PAX with 4 stays has a beta cap of one.
    buy(repo.as_ref(), first, PaxCategory::Eight, 4, None, 68)
        .await
        .unwrap();
    let err = buy(repo.as_ref(), second, PaxCategory::Eight, 4, None, 68)
        .await
        .unwrap_err();
    match err {
        DomainError::Unavailable { reason, waitlist } => {
            assert_eq!(reason, "Product beta cap reached");
            assert!(waitlist);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_global_cap_blocks_other_products() {
    let repo = seeded_repo().await;
    let first = create_user(repo.as_ref(), "g1@example.com", "Global One").await;
    let second = create_user(repo.as_ref(), "g2@example.com", "Global Two").await;

    buy(repo.as_ref(), first, PaxCategory::Two, 1, None, 1)
        .await
        .unwrap();
    let err = buy(repo.as_ref(), second, PaxCategory::Six, 2, None, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. }));

    let product = repo
        .find_product_by_spec(spec(PaxCategory::Six, 2))
        .await
        .unwrap()
        .unwrap();
    let availability = services::product_availability(repo.as_ref(), product.id, 1)
        .await
        .unwrap();
    assert!(!availability.available);
    assert_eq!(availability.reason.as_deref(), Some("Global beta cap reached"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_exceed_product_cap() {
    let repo = seeded_repo().await;
    let mut buyers = Vec::new();
    for i in 0..20 {
        let email = format!("rush{}@example.com", i);
        buyers.push(create_user(repo.as_ref(), &email, "Rush Buyer").await);
    }

    // 2 PAX with 1 stay has a beta cap of five.
    let handles: Vec<_> = buyers
        .into_iter()
        .map(|buyer| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                buy(repo.as_ref(), buyer, PaxCategory::Two, 1, None, 68).await
            })
        })
        .collect();

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(DomainError::Unavailable { waitlist, .. }) => assert!(waitlist),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(sold, 5);

    let product = repo
        .find_product_by_spec(spec(PaxCategory::Two, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.sold_count, 5);
    assert_eq!(repo.list_certificates().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_purchase_validation_reports_fields() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "v@example.com", "Val Idation").await;
    let product = repo
        .find_product_by_spec(spec(PaxCategory::Two, 1))
        .await
        .unwrap()
        .unwrap();
    let err = services::purchase_certificate(
        repo.as_ref(),
        PurchaseRequest {
            user_id: buyer,
            product_id: product.id,
            holder_name: "A".to_string(),
            holder_email: "not-an-email".to_string(),
            wallet_address: None,
            payment_method: PaymentMethod::Oxxo,
            payment_reference: None,
            referral_code: None,
        },
        68,
    )
    .await
    .unwrap_err();
    match err {
        DomainError::Validation(fields) => {
            assert!(fields.contains_key("holder_name"));
            assert!(fields.contains_key("holder_email"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// =========================================================
// Payment webhooks
// =========================================================

#[tokio::test]
async fn test_oxxo_purchase_settles_when_every_order_is_paid() {
    let repo = seeded_repo().await;
    let broker = create_broker(repo.as_ref(), "broker@week-chain.com", "OXXO-01").await;
    let buyer = create_user(repo.as_ref(), "oxxo@example.com", "Olga Ruiz").await;

    let receipt = buy_with(
        repo.as_ref(),
        buyer,
        PaxCategory::Two,
        1,
        Some("OXXO-01"),
        68,
        PaymentMethod::Oxxo,
    )
    .await
    .unwrap();

    // 3,500 USD is 61,250 MXN: six full store payments and a remainder.
    assert_eq!(receipt.payments.len(), 7);
    assert!(receipt.payments.iter().all(|p| p.status == PaymentStatus::Pending));
    let group = receipt.payments[0].payment_group_id.clone().unwrap();
    assert_eq!(receipt.voucher.payment_reference, group);
    assert_eq!(receipt.voucher.status, VoucherStatus::Pending);
    assert_eq!(receipt.certificate.status, CertificateStatus::Paused);
    assert!(receipt.commissions.is_empty());

    let view = services::verify_certificate(repo.as_ref(), &receipt.voucher.voucher_code)
        .await
        .unwrap();
    assert!(!view.status_info.valid);

    let (last, first_six) = receipt.payments.split_last().unwrap();
    for payment in first_six {
        let outcome = services::handle_payment_event(
            repo.as_ref(),
            order_event("order.paid", &payment.order_id),
        )
        .await
        .unwrap();
        assert_eq!(outcome.updated, 1);
        assert!(outcome.vouchers.is_empty());
    }
    let cert = repo.get_certificate(receipt.certificate.id).await.unwrap();
    assert_eq!(cert.status, CertificateStatus::Paused);

    // Replays of a paid order change nothing.
    let replay = services::handle_payment_event(
        repo.as_ref(),
        order_event("order.expired", &first_six[0].order_id),
    )
    .await
    .unwrap();
    assert_eq!(replay.updated, 0);

    let outcome =
        services::handle_payment_event(repo.as_ref(), order_event("order.paid", &last.order_id))
            .await
            .unwrap();
    assert_eq!(outcome.vouchers, vec![receipt.voucher.voucher_code.clone()]);

    let cert = repo.get_certificate(receipt.certificate.id).await.unwrap();
    assert_eq!(cert.status, CertificateStatus::Active);
    let voucher = repo
        .find_voucher_for_certificate(receipt.certificate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(voucher.status, VoucherStatus::Active);

    let commissions = services::broker_commissions(repo.as_ref(), broker).await.unwrap();
    assert_eq!(commissions.commissions.len(), 1);
    assert!(approx(commissions.totals.pending, 140.0));
}

#[tokio::test]
async fn test_expired_spei_order_cancels_and_returns_the_unit() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "spei@example.com", "Sergio Paz").await;
    let receipt = buy_with(
        repo.as_ref(),
        buyer,
        PaxCategory::Six,
        2,
        None,
        68,
        PaymentMethod::Spei,
    )
    .await
    .unwrap();
    assert_eq!(receipt.payments.len(), 1);
    let order_id = receipt.payments[0].order_id.clone();
    assert_eq!(receipt.voucher.payment_reference, order_id);

    let product = repo
        .find_product_by_spec(spec(PaxCategory::Six, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.sold_count, 1);

    let pending = services::handle_payment_event(
        repo.as_ref(),
        order_event("order.pending_payment", &order_id),
    )
    .await
    .unwrap();
    assert_eq!(pending.updated, 0);

    let outcome =
        services::handle_payment_event(repo.as_ref(), order_event("order.expired", &order_id))
            .await
            .unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.vouchers.len(), 1);

    let cert = repo.get_certificate(receipt.certificate.id).await.unwrap();
    assert_eq!(cert.status, CertificateStatus::Cancelled);
    let product = repo.get_product(product.id).await.unwrap();
    assert_eq!(product.sold_count, 0);
    let payments = repo.list_payments_for_order(&order_id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Expired);
}

#[tokio::test]
async fn test_unknown_orders_and_events_are_acknowledged() {
    let repo = seeded_repo().await;
    let unknown =
        services::handle_payment_event(repo.as_ref(), order_event("order.paid", "ord_missing"))
            .await
            .unwrap();
    assert!(unknown.received);
    assert_eq!(unknown.updated, 0);

    let charge =
        services::handle_payment_event(repo.as_ref(), order_event("charge.paid", "ord_missing"))
            .await
            .unwrap();
    assert!(charge.received);

    let other =
        services::handle_payment_event(repo.as_ref(), order_event("customer.created", "cus_1"))
            .await
            .unwrap();
    assert!(other.received);
}

// =========================================================
// Reservation lifecycle
// =========================================================

#[tokio::test]
async fn test_reservation_request_lifecycle() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "maria@example.com", "María Pérez").await;
    let receipt = buy(repo.as_ref(), user, PaxCategory::Four, 2, None, 68)
        .await
        .unwrap();
    let certificate_id = receipt.certificate.id;
    let property = create_property(repo.as_ref(), "Casa Tulum", "Tulum", PropertyCategory::A, 4).await;

    let today = Utc::now().date_naive();
    let request = |start_offset: i64| SubmitReservationRequest {
        user_id: user,
        certificate_id,
        desired_start_date: today + Duration::days(start_offset),
        desired_end_date: today + Duration::days(start_offset + 7),
        flexibility_days: 0,
        party_size: 4,
        destination_preference: Some("Tulum".to_string()),
        category_preference: Some("A".to_string()),
        special_requests: None,
    };

    let err = services::submit_reservation_request(repo.as_ref(), request(30), today)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ConsentRequired(_)));

    accept_reservation_terms(repo.as_ref(), user).await;

    // Gold tier books at most 180 days ahead.
    let err = services::submit_reservation_request(repo.as_ref(), request(200), today)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotEligible(_)));

    let submitted = services::submit_reservation_request(repo.as_ref(), request(30), today)
        .await
        .unwrap();
    assert_eq!(submitted.status, ReservationRequestStatus::Requested);

    let offered = services::offer_request(repo.as_ref(), submitted.id, property)
        .await
        .unwrap();
    assert_eq!(offered.status, ReservationRequestStatus::Offered);
    assert_eq!(offered.matched_property_id, Some(property));

    let reservation = services::confirm_request(repo.as_ref(), submitted.id, today)
        .await
        .unwrap();
    assert_eq!(reservation.property_id, property);
    let cert = repo.get_certificate(certificate_id).await.unwrap();
    assert_eq!(cert.remaining_weeks_this_year, 1);

    // Confirming twice is an invalid transition.
    let err = services::confirm_request(repo.as_ref(), submitted.id, today)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. } | DomainError::InvalidTransition { .. }));

    // Same dates, same property: blocked by the confirmed stay.
    let overlapping = services::submit_reservation_request(repo.as_ref(), request(32), today)
        .await
        .unwrap();
    services::offer_request(repo.as_ref(), overlapping.id, property)
        .await
        .unwrap();
    let err = services::confirm_request(repo.as_ref(), overlapping.id, today)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { waitlist: false, .. }));

    let cancelled = services::cancel_request(
        repo.as_ref(),
        overlapping.id,
        "Las fechas ya no funcionan para nosotros",
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, ReservationRequestStatus::Cancelled);

    let err = services::cancel_request(repo.as_ref(), overlapping.id, "Otra vez cancelado")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_last_week_used_blocks_new_requests() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "one@example.com", "One Week").await;
    let receipt = buy(repo.as_ref(), user, PaxCategory::Two, 1, None, 68)
        .await
        .unwrap();
    let property = create_property(repo.as_ref(), "Loft CDMX", "Ciudad de México", PropertyCategory::B, 2).await;
    accept_reservation_terms(repo.as_ref(), user).await;

    let today = Utc::now().date_naive();
    let submitted = services::submit_reservation_request(
        repo.as_ref(),
        SubmitReservationRequest {
            user_id: user,
            certificate_id: receipt.certificate.id,
            desired_start_date: today + Duration::days(10),
            desired_end_date: today + Duration::days(17),
            flexibility_days: 0,
            party_size: 2,
            destination_preference: None,
            category_preference: None,
            special_requests: None,
        },
        today,
    )
    .await
    .unwrap();
    services::offer_request(repo.as_ref(), submitted.id, property)
        .await
        .unwrap();
    services::confirm_request(repo.as_ref(), submitted.id, today)
        .await
        .unwrap();

    let eligibility =
        services::certificate_eligibility(repo.as_ref(), receipt.certificate.id, today)
            .await
            .unwrap();
    assert!(!eligibility.allowed);
    assert_eq!(eligibility.reason.as_deref(), Some("No weeks remaining this year"));
}

#[tokio::test]
async fn test_offer_rejects_small_property() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "big@example.com", "Big Family").await;
    let receipt = buy(repo.as_ref(), user, PaxCategory::Six, 1, None, 68)
        .await
        .unwrap();
    let studio = create_property(repo.as_ref(), "Studio", "Mérida", PropertyCategory::C, 2).await;
    accept_reservation_terms(repo.as_ref(), user).await;

    let today = Utc::now().date_naive();
    let submitted = services::submit_reservation_request(
        repo.as_ref(),
        SubmitReservationRequest {
            user_id: user,
            certificate_id: receipt.certificate.id,
            desired_start_date: today + Duration::days(5),
            desired_end_date: today + Duration::days(12),
            flexibility_days: 0,
            party_size: 6,
            destination_preference: None,
            category_preference: None,
            special_requests: None,
        },
        today,
    )
    .await
    .unwrap();

    let err = services::offer_request(repo.as_ref(), submitted.id, studio)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotEligible(_)));
}

#[tokio::test]
async fn test_match_prefers_destination_and_lists_alternatives() {
    let repo = seeded_repo().await;
    let cancun = create_property(repo.as_ref(), "Villa Cancún", "Cancún", PropertyCategory::A, 6).await;
    let tulum = create_property(repo.as_ref(), "Casa Tulum", "Tulum", PropertyCategory::A, 4).await;
    create_property(repo.as_ref(), "Studio", "Tulum", PropertyCategory::C, 2).await;

    let start = Utc::now().date_naive() + Duration::days(20);
    let result = services::match_properties(
        repo.as_ref(),
        &MatchOptions {
            desired_start_date: start,
            desired_end_date: start + Duration::days(7),
            flexibility_days: 0,
            party_size: 4,
            destination_preference: Some("tulum".to_string()),
            category_preference: None,
        },
    )
    .await
    .unwrap();

    let best = result.best.unwrap();
    assert_eq!(best.property.id, tulum);
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.alternatives[0].property.id, cancun);
}

#[tokio::test]
async fn test_match_rejects_inverted_dates() {
    let repo = seeded_repo().await;
    let start = Utc::now().date_naive();
    let err = services::match_properties(
        repo.as_ref(),
        &MatchOptions {
            desired_start_date: start,
            desired_end_date: start,
            flexibility_days: 0,
            party_size: 2,
            destination_preference: None,
            category_preference: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

// =========================================================
// Compliance
// =========================================================

#[tokio::test]
async fn test_consent_version_and_presence() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "consent@example.com", "Con Sent").await;

    let missing = services::check_consent(repo.as_ref(), user, ConsentType::Terms, None)
        .await
        .unwrap();
    assert!(!missing.valid);

    let record = services::record_consent(
        repo.as_ref(),
        RecordConsent {
            user_id: user,
            consent_type: ConsentType::Terms,
            document_version: "2025-01".to_string(),
            ip_address: None,
            user_agent: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(record.evidence_hash.len(), 64);

    let ok = services::check_consent(repo.as_ref(), user, ConsentType::Terms, Some("2025-01"))
        .await
        .unwrap();
    assert!(ok.valid);

    let outdated =
        services::check_consent(repo.as_ref(), user, ConsentType::Terms, Some("2025-06"))
            .await
            .unwrap();
    assert!(!outdated.valid);
    assert!(outdated.error.unwrap().starts_with("Outdated"));
}

#[tokio::test]
async fn test_evidence_log_verifies() {
    let repo = seeded_repo().await;
    let mut payload = serde_json::Map::new();
    payload.insert("amount".into(), 3500.into());
    let record = services::log_evidence(
        repo.as_ref(),
        EvidenceEvent {
            event_type: "payment_received".to_string(),
            entity_type: "voucher".to_string(),
            entity_id: "WC-TEST".to_string(),
            user_id: None,
            actor_role: Some("system".to_string()),
            payload,
            document_version: None,
            ip_address: None,
            user_agent: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(record.hash_sha256.len(), 64);
    assert!(record.hash_sha256.chars().all(|c| c.is_ascii_hexdigit()));

    let integrity = services::verify_evidence(repo.as_ref(), record.id).await.unwrap();
    assert!(integrity.valid);
    assert_eq!(integrity.hash_sha256, record.hash_sha256);
}

#[tokio::test]
async fn test_verification_by_id_and_voucher_code() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "verify@example.com", "Veri Fied").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Two, 3, None, 68)
        .await
        .unwrap();

    let by_id = services::verify_certificate(repo.as_ref(), &receipt.certificate.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_id.status, "active");
    assert_eq!(by_id.voucher_code.as_deref(), Some(receipt.voucher.voucher_code.as_str()));
    assert_eq!(by_id.holder_wallet, "0x1234...5678");

    let by_code = services::verify_certificate(repo.as_ref(), &receipt.voucher.voucher_code)
        .await
        .unwrap();
    assert_eq!(by_code.certificate_id, receipt.certificate.id.to_string());

    let err = services::verify_certificate(repo.as_ref(), &CertificateId::generate().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_verification_season_follows_latest_stay() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "season@example.com", "Sara Estrada").await;
    let receipt = buy(repo.as_ref(), user, PaxCategory::Four, 2, None, 68)
        .await
        .unwrap();
    accept_reservation_terms(repo.as_ref(), user).await;

    let today = Utc::now().date_naive();
    let check_in = today + Duration::days(30);
    let week = check_in.iso_week().week();
    let villa = SupplyProperty {
        id: PropertyId::generate(),
        name: "Villa Alta".to_string(),
        country: "México".to_string(),
        city: "Los Cabos".to_string(),
        category: PropertyCategory::A,
        max_occupancy: 6,
        bedrooms: 3,
        bathrooms: 3.0,
        supply_weeks_per_year: Some(48),
        blackout_weeks: 0,
        status: PropertyStatus::Active,
        amenities: Vec::new(),
        seasonal_pricing: vec![SeasonalPricing {
            weeks: vec![week],
            multiplier: 1.6,
        }],
    };
    repo.upsert_property(&villa).await.unwrap();

    let before = services::verify_certificate(repo.as_ref(), &receipt.certificate.id.to_string())
        .await
        .unwrap();
    assert_eq!(before.season, "Temporada Estándar");

    let submitted = services::submit_reservation_request(
        repo.as_ref(),
        SubmitReservationRequest {
            user_id: user,
            certificate_id: receipt.certificate.id,
            desired_start_date: check_in,
            desired_end_date: check_in + Duration::days(7),
            flexibility_days: 0,
            party_size: 4,
            destination_preference: Some("Los Cabos".to_string()),
            category_preference: None,
            special_requests: None,
        },
        today,
    )
    .await
    .unwrap();
    services::offer_request(repo.as_ref(), submitted.id, villa.id)
        .await
        .unwrap();
    services::confirm_request(repo.as_ref(), submitted.id, today)
        .await
        .unwrap();

    let after = services::verify_certificate(repo.as_ref(), &receipt.voucher.voucher_code)
        .await
        .unwrap();
    assert_eq!(after.season, "Temporada Alta");
}

#[tokio::test]
async fn test_contact_form_validation() {
    let repo = seeded_repo().await;
    let err = services::submit_contact(
        repo.as_ref(),
        ContactForm {
            name: "A".to_string(),
            email: "bad".to_string(),
            phone: Some("abc".to_string()),
            subject: " ".to_string(),
            message: "corto".to_string(),
        },
    )
    .await
    .unwrap_err();
    match err {
        DomainError::Validation(fields) => {
            for field in ["name", "email", "phone", "subject", "message"] {
                assert!(fields.contains_key(field), "missing {}", field);
            }
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let stored = services::submit_contact(
        repo.as_ref(),
        ContactForm {
            name: "Laura Gómez".to_string(),
            email: "Laura@Example.com".to_string(),
            phone: Some("+52 55 1234 5678".to_string()),
            subject: "Información".to_string(),
            message: "Quiero saber más sobre los certificados.".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(stored.email, "laura@example.com");
    assert_eq!(repo.list_contact_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_attribution_requires_lead_and_valid_code() {
    let repo = seeded_repo().await;
    create_broker(repo.as_ref(), "attr@week-chain.com", "ATTR-01").await;

    let err = services::create_attribution(repo.as_ref(), "ATTR-01", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = services::create_attribution(
        repo.as_ref(),
        "MISSING",
        Some("lead@example.com".to_string()),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let attribution = services::create_attribution(
        repo.as_ref(),
        "attr-01",
        Some("Lead@Example.com".to_string()),
        None,
    )
    .await
    .unwrap();
    assert_eq!(attribution.lead_email.as_deref(), Some("lead@example.com"));
    assert_eq!(attribution.expires_at - attribution.created_at, Duration::days(30));
}

#[tokio::test]
async fn test_earlier_attribution_links_buyer() {
    let repo = seeded_repo().await;
    let broker = create_broker(repo.as_ref(), "link@week-chain.com", "LINK-01").await;
    services::create_attribution(
        repo.as_ref(),
        "LINK-01",
        Some("later@example.com".to_string()),
        None,
    )
    .await
    .unwrap();

    let buyer = create_user(repo.as_ref(), "later@example.com", "Later Buyer").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Two, 1, None, 68)
        .await
        .unwrap();
    assert_eq!(receipt.commissions.len(), 1);
    assert_eq!(receipt.commissions[0].broker_id, broker);
}

// =========================================================
// Maintenance
// =========================================================

#[tokio::test]
async fn test_capacity_snapshot_from_supply() {
    let repo = seeded_repo().await;
    assert!(services::latest_capacity(repo.as_ref()).await.unwrap().is_none());
    create_property(repo.as_ref(), "Casa Uno", "Tulum", PropertyCategory::A, 4).await;

    let snapshot = services::recalculate_capacity(repo.as_ref()).await.unwrap();
    assert_eq!(snapshot.total_supply_weeks, 48);
    assert_eq!(snapshot.safe_capacity, 33);
    assert_eq!(snapshot.active_properties, 1);

    let latest = services::latest_capacity(repo.as_ref()).await.unwrap().unwrap();
    assert_eq!(latest.id, snapshot.id);
}

#[tokio::test]
async fn test_overbooked_supply_closes_sales() {
    let repo = seeded_repo().await;
    let buyer = create_user(repo.as_ref(), "ana@example.com", "Ana López").await;
    let receipt = buy(repo.as_ref(), buyer, PaxCategory::Two, 4, None, 68)
        .await
        .unwrap();
    assert_eq!(receipt.certificate.tier, CertificateTier::Signature);

    let product_id = repo
        .find_product_by_spec(spec(PaxCategory::Two, 4))
        .await
        .unwrap()
        .unwrap()
        .id;
    let cap = services::beta_cap(repo.as_ref(), product_id, 68).await.unwrap();
    assert!(cap.available);
    assert_eq!(cap.remaining_for_product, 4);
    assert_eq!(cap.remaining_total, 67);
    assert!(services::is_tier_available(repo.as_ref(), receipt.certificate.tier)
        .await
        .unwrap());

    let tiny = SupplyProperty {
        id: PropertyId::generate(),
        name: "Cabaña".to_string(),
        country: "México".to_string(),
        city: "Valle de Bravo".to_string(),
        category: PropertyCategory::C,
        max_occupancy: 2,
        bedrooms: 1,
        bathrooms: 1.0,
        supply_weeks_per_year: Some(1),
        blackout_weeks: 0,
        status: PropertyStatus::Active,
        amenities: Vec::new(),
        seasonal_pricing: Vec::new(),
    };
    repo.upsert_property(&tiny).await.unwrap();

    let snapshot = services::recalculate_capacity(repo.as_ref()).await.unwrap();
    assert_eq!(snapshot.safe_capacity, 0);
    assert!(services::is_tier_available(repo.as_ref(), CertificateTier::Silver)
        .await
        .unwrap());

    let extra = SupplyProperty {
        id: PropertyId::generate(),
        supply_weeks_per_year: Some(1),
        ..tiny
    };
    repo.upsert_property(&extra).await.unwrap();
    let snapshot = services::recalculate_capacity(repo.as_ref()).await.unwrap();
    assert_eq!(snapshot.safe_capacity, 1);
    assert!(!services::is_tier_available(repo.as_ref(), CertificateTier::Silver)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_annual_reset_restores_allowance() {
    let repo = seeded_repo().await;
    let user = create_user(repo.as_ref(), "reset@example.com", "Re Set").await;
    let receipt = buy(repo.as_ref(), user, PaxCategory::Two, 2, None, 68)
        .await
        .unwrap();

    let mut cert = receipt.certificate.clone();
    cert.remaining_weeks_this_year = 0;
    cert.year_start_date = cert.year_start_date - Duration::days(400);
    repo.update_certificate(&cert).await.unwrap();

    let today = Utc::now().date_naive();
    assert_eq!(services::run_annual_reset(repo.as_ref(), today).await.unwrap(), 1);
    let cert = repo.get_certificate(cert.id).await.unwrap();
    assert_eq!(cert.remaining_weeks_this_year, 2);
}

#[tokio::test]
async fn test_referral_counter_reset_is_audited() {
    let repo = seeded_repo().await;
    let broker = create_broker(repo.as_ref(), "count@week-chain.com", "COUNT-01").await;
    let buyer = create_user(repo.as_ref(), "counted@example.com", "Counted Buyer").await;
    buy(repo.as_ref(), buyer, PaxCategory::Two, 1, Some("COUNT-01"), 68)
        .await
        .unwrap();
    assert_eq!(repo.get_user(broker).await.unwrap().referrals_this_month, 1);

    let reset = services::reset_referral_counters(repo.as_ref()).await.unwrap();
    assert!(reset >= 1);
    assert_eq!(repo.get_user(broker).await.unwrap().referrals_this_month, 0);
}

#[tokio::test]
async fn test_maintenance_job_completes() {
    let repo = seeded_repo().await;
    let tracker = JobTracker::new();
    let job_id = maintenance::spawn_task(repo.clone(), tracker.clone(), MaintenanceTask::Capacity);

    let mut status = JobStatus::Running;
    for _ in 0..100 {
        status = tracker.get_job(&job_id).unwrap().status;
        if status != JobStatus::Running {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(status, JobStatus::Completed);

    let job = tracker.get_job(&job_id).unwrap();
    assert_eq!(job.result.unwrap()["system_status"], "GREEN");
    assert!(!job.logs.is_empty());
}

// =========================================================
// Administration & testimonials
// =========================================================

#[tokio::test]
async fn test_root_admin_is_created_once_and_promotes_existing_accounts() {
    let repo = seeded_repo().await;
    let admin = services::ensure_root_admin(repo.as_ref(), " Root@Week-Chain.com ", "Root")
        .await
        .unwrap();
    assert_eq!(admin.email, "root@week-chain.com");
    assert_eq!(admin.role, UserRole::SuperAdmin);

    let again = services::ensure_root_admin(repo.as_ref(), "root@week-chain.com", "Root")
        .await
        .unwrap();
    assert_eq!(again.id, admin.id);

    let existing = create_user(repo.as_ref(), "owner@example.com", "Owner Person").await;
    let promoted = services::ensure_root_admin(repo.as_ref(), "owner@example.com", "Owner")
        .await
        .unwrap();
    assert_eq!(promoted.id, existing);
    assert_eq!(repo.get_user(existing).await.unwrap().role, UserRole::SuperAdmin);
}

#[tokio::test]
async fn test_role_user_creation_is_guarded() {
    let repo = seeded_repo().await;
    let root = create_role_user(repo.as_ref(), "root@week-chain.com", UserRole::SuperAdmin).await;
    let admin = create_role_user(repo.as_ref(), "admin@week-chain.com", UserRole::Admin).await;
    let customer = create_user(repo.as_ref(), "customer@example.com", "Cli Ente").await;

    let request = |email: &str, role: UserRole| CreateRoleUser {
        email: email.to_string(),
        full_name: "Nueva Cuenta".to_string(),
        role,
        wallet_address: None,
    };

    let notary = services::create_role_user(
        repo.as_ref(),
        admin,
        request("Notaria@Example.com", UserRole::Notaria),
    )
    .await
    .unwrap();
    assert_eq!(notary.email, "notaria@example.com");
    assert_eq!(notary.role, UserRole::Notaria);

    let err = services::create_role_user(
        repo.as_ref(),
        admin,
        request("second-admin@example.com", UserRole::Admin),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    services::create_role_user(
        repo.as_ref(),
        root,
        request("second-admin@example.com", UserRole::Admin),
    )
    .await
    .unwrap();

    let err = services::create_role_user(
        repo.as_ref(),
        customer,
        request("staff@example.com", UserRole::Staff),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let err = services::create_role_user(
        repo.as_ref(),
        UserId::generate(),
        request("staff@example.com", UserRole::Staff),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let err = services::create_role_user(
        repo.as_ref(),
        admin,
        request("notaria@example.com", UserRole::Staff),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}

#[tokio::test]
async fn test_created_property_counts_toward_capacity() {
    let repo = seeded_repo().await;
    let property = services::create_property(
        repo.as_ref(),
        CreateProperty {
            name: " Casa Bacalar ".to_string(),
            country: "México".to_string(),
            city: "Bacalar".to_string(),
            category: PropertyCategory::B,
            max_occupancy: 6,
            bedrooms: 3,
            bathrooms: 2.5,
            supply_weeks_per_year: Some(40),
            blackout_weeks: 2,
            amenities: vec!["kayak".to_string(), " ".to_string()],
            seasonal_pricing: vec![SeasonalPricing {
                weeks: vec![51, 52],
                multiplier: 2.2,
            }],
        },
    )
    .await
    .unwrap();
    assert_eq!(property.name, "Casa Bacalar");
    assert_eq!(property.status, PropertyStatus::Active);
    assert_eq!(property.amenities, vec!["kayak".to_string()]);

    let snapshot = services::recalculate_capacity(repo.as_ref()).await.unwrap();
    assert_eq!(snapshot.active_properties, 1);
    assert_eq!(snapshot.total_supply_weeks, 40);

    let err = services::create_property(
        repo.as_ref(),
        CreateProperty {
            name: String::new(),
            country: "México".to_string(),
            city: "Bacalar".to_string(),
            category: PropertyCategory::B,
            max_occupancy: 0,
            bedrooms: 1,
            bathrooms: 1.0,
            supply_weeks_per_year: Some(60),
            blackout_weeks: 0,
            amenities: Vec::new(),
            seasonal_pricing: vec![SeasonalPricing {
                weeks: vec![53],
                multiplier: 0.0,
            }],
        },
    )
    .await
    .unwrap_err();
    match err {
        DomainError::Validation(fields) => {
            assert!(fields.contains_key("name"));
            assert!(fields.contains_key("max_occupancy"));
            assert!(fields.contains_key("supply_weeks_per_year"));
            assert_eq!(fields["seasonal_pricing"].len(), 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_toggle_sales_stops_one_tier() {
    let repo = seeded_repo().await;
    let err = services::toggle_sales(repo.as_ref(), CertificateTier::Gold, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));

    create_property(repo.as_ref(), "Casa Uno", "Tulum", PropertyCategory::A, 4).await;
    let computed = services::recalculate_capacity(repo.as_ref()).await.unwrap();
    let toggled = services::toggle_sales(repo.as_ref(), CertificateTier::Gold, false)
        .await
        .unwrap();
    assert_ne!(toggled.id, computed.id);
    assert!(!toggled.sales_enabled.gold);
    assert!(toggled.sales_enabled.silver);
    assert_eq!(toggled.utilization_pct, computed.utilization_pct);

    let buyer = create_user(repo.as_ref(), "gold@example.com", "Gol Den").await;
    let err = buy(repo.as_ref(), buyer, PaxCategory::Two, 2, None, 68)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. }));
    buy(repo.as_ref(), buyer, PaxCategory::Two, 1, None, 68)
        .await
        .unwrap();

    services::toggle_sales(repo.as_ref(), CertificateTier::Gold, true)
        .await
        .unwrap();
    buy(repo.as_ref(), buyer, PaxCategory::Two, 2, None, 68)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_testimonials_need_approval_before_publishing() {
    let repo = seeded_repo().await;
    let reviewer = create_role_user(repo.as_ref(), "admin@week-chain.com", UserRole::Admin).await;
    let submit = |title: &str| SubmitTestimonial {
        user_name: "Lucía Gómez".to_string(),
        user_email: "Lucia@Example.com".to_string(),
        user_city: Some("Monterrey".to_string()),
        certificate_type: Some("4 PAX".to_string()),
        rating: 5,
        title: title.to_string(),
        comment: "Reservamos en Tulum sin complicaciones y todo salió perfecto".to_string(),
        would_recommend: true,
    };

    let first = services::submit_testimonial(repo.as_ref(), submit("Excelente"))
        .await
        .unwrap();
    assert_eq!(first.status, TestimonialStatus::Pending);
    assert_eq!(first.user_email, "lucia@example.com");
    let second = services::submit_testimonial(repo.as_ref(), submit("Muy bien"))
        .await
        .unwrap();
    assert!(services::list_public_testimonials(repo.as_ref(), None)
        .await
        .unwrap()
        .is_empty());

    let approved = services::review_testimonial(
        repo.as_ref(),
        reviewer,
        first.id,
        TestimonialStatus::Approved,
        Some("Publicar".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(approved.reviewed_by, Some(reviewer));
    assert!(approved.reviewed_at.is_some());
    services::review_testimonial(
        repo.as_ref(),
        reviewer,
        second.id,
        TestimonialStatus::Rejected,
        None,
    )
    .await
    .unwrap();

    let public = services::list_public_testimonials(repo.as_ref(), Some(6))
        .await
        .unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, first.id);

    let rejected =
        services::list_testimonials_admin(repo.as_ref(), Some(TestimonialStatus::Rejected))
            .await
            .unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].id, second.id);

    let err = services::review_testimonial(
        repo.as_ref(),
        reviewer,
        second.id,
        TestimonialStatus::Pending,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let mut bad = submit("Sin estrellas");
    bad.rating = 0;
    let err = services::submit_testimonial(repo.as_ref(), bad).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}
