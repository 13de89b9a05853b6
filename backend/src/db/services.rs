//! Service layer orchestrating the repository and the domain rules.
//!
//! Every function takes `&dyn FullRepository` so the same code runs against
//! the in-memory and the Postgres backend. Pure rules live in
//! `crate::services`; this module loads what they need, applies them and
//! writes the outcome back.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::repository::{FullRepository, RepositoryError};
use crate::models::{
    BrokerLevel, BrokerLevelTag, BrokerProfile, CapacitySnapshot, CapacityStatusId,
    CertificateId, CertificateProduct, CertificateStatus, CertificateTier, CertificateVoucher,
    Commission, ConfirmedReservation, ConfirmedReservationStatus, ConsentId, ConsentRecord,
    ConsentType, ContactRequest, ContactRequestId, Currency, EvidenceEvent, EvidenceId,
    EvidenceRecord, PaymentId, PaymentMethod, PaymentRecord, PaymentStatus, Permission,
    ProductId, PropertyCategory, PropertyId, PropertyStatus, ReferralAttribution, ReferralEdge,
    RequestId, ReservationId, ReservationRequest, ReservationRequestStatus, Season,
    SeasonalPricing, SupplyProperty, Testimonial, TestimonialId, TestimonialStatus,
    UserAccount, UserCertificate, UserId, UserRole, VoucherId, VoucherStatus, WaitlistEntry,
    WaitlistEntryId, WaitlistStatus,
};
use crate::services::capacity::{self, BetaCapCheck};
use crate::services::commissions::{self, BrokerStats, CommissionTotals, LevelProgress, RetirementBonus};
use crate::services::consent::{self, ConsentCheck};
use crate::services::error::{DomainError, DomainResult, FieldErrorsBuilder};
use crate::services::evidence;
use crate::services::lifecycle::{self, Eligibility};
use crate::services::matcher::{self, MatchOptions, PropertyMatch};
use crate::services::payments;
use crate::services::products::{self, ProductAvailability};
use crate::services::roles;
use crate::services::validation;
use crate::services::verification::{self, VerificationView};

// ==================== Health & seed data ====================

pub async fn health_check(repo: &dyn FullRepository) -> DomainResult<bool> {
    Ok(repo.health_check().await?)
}

/// Insert the PAX catalog when no product exists yet.
///
/// # Returns
/// Number of products inserted (0 when a catalog is already present).
pub async fn seed_catalog_if_empty(repo: &dyn FullRepository) -> DomainResult<usize> {
    if !repo.list_products().await?.is_empty() {
        return Ok(0);
    }
    let catalog = products::seed_catalog();
    for product in &catalog {
        repo.upsert_product(product).await?;
    }
    log::info!("Seeded {} catalog products", catalog.len());
    Ok(catalog.len())
}

// ==================== Capacity ====================

/// Compute a fresh snapshot from current supply and demand and store it.
pub async fn recalculate_capacity(repo: &dyn FullRepository) -> DomainResult<CapacitySnapshot> {
    let properties = repo.list_properties().await?;
    let certificates = repo.list_certificates().await?;
    let waiting = repo.count_waiting().await?;

    let snapshot = capacity::compute_snapshot(&properties, &certificates, waiting);
    repo.insert_capacity_snapshot(&snapshot).await?;
    log::info!(
        "Capacity recalculated: {:.2}% utilization, status {}",
        snapshot.utilization_pct,
        snapshot.system_status
    );
    Ok(snapshot)
}

pub async fn latest_capacity(repo: &dyn FullRepository) -> DomainResult<Option<CapacitySnapshot>> {
    Ok(repo.latest_capacity_snapshot().await?)
}

pub async fn is_tier_available(
    repo: &dyn FullRepository,
    tier: CertificateTier,
) -> DomainResult<bool> {
    let latest = repo.latest_capacity_snapshot().await?;
    Ok(capacity::is_tier_available(latest.as_ref(), tier))
}

// ==================== Catalog ====================

pub async fn list_active_products(
    repo: &dyn FullRepository,
) -> DomainResult<Vec<CertificateProduct>> {
    Ok(repo
        .list_products()
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .collect())
}

/// Availability of one product. Unknown ids yield an unavailable answer
/// rather than an error.
pub async fn product_availability(
    repo: &dyn FullRepository,
    product_id: ProductId,
    total_cap: u32,
) -> DomainResult<ProductAvailability> {
    let catalog = repo.list_products().await?;
    let Some(product) = catalog.iter().find(|p| p.id == product_id) else {
        return Ok(ProductAvailability::not_found());
    };
    let latest = repo.latest_capacity_snapshot().await?;
    Ok(products::evaluate_availability(
        product,
        capacity::total_sold(&catalog),
        total_cap,
        latest.as_ref(),
    ))
}

pub async fn beta_cap(
    repo: &dyn FullRepository,
    product_id: ProductId,
    total_cap: u32,
) -> DomainResult<BetaCapCheck> {
    let catalog = repo.list_products().await?;
    let product = catalog.iter().find(|p| p.id == product_id);
    Ok(capacity::check_beta_cap(product, &catalog, total_cap))
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinWaitlist {
    pub email: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub tier: Option<CertificateTier>,
}

pub async fn join_waitlist(
    repo: &dyn FullRepository,
    request: JoinWaitlist,
) -> DomainResult<WaitlistEntry> {
    let mut errors = FieldErrorsBuilder::new();
    validation::check_email(&mut errors, "email", &request.email);
    errors.finish()?;

    let entry = WaitlistEntry {
        id: WaitlistEntryId::generate(),
        email: request.email.trim().to_lowercase(),
        user_id: request.user_id,
        product_id: request.product_id,
        tier: request.tier,
        status: WaitlistStatus::Waiting,
        created_at: Utc::now(),
    };
    repo.insert_waitlist_entry(&entry).await?;
    Ok(entry)
}

// ==================== Purchases ====================

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub holder_name: String,
    pub holder_email: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub certificate: UserCertificate,
    pub voucher: CertificateVoucher,
    pub payments: Vec<PaymentRecord>,
    pub commissions: Vec<Commission>,
}

/// Issue a certificate for a product.
///
/// The sale must pass the product availability checks and the tier's
/// stop-sale flag, then claims one unit of the beta caps before anything is
/// written. Card purchases settle immediately. OXXO and SPEI purchases
/// leave the certificate paused and the voucher pending until the payment
/// webhook reports every order paid. A referral code, or an earlier
/// unexpired attribution, places a first-time buyer under the referring
/// broker; commissions are recorded when the sale settles.
pub async fn purchase_certificate(
    repo: &dyn FullRepository,
    request: PurchaseRequest,
    total_cap: u32,
) -> DomainResult<PurchaseReceipt> {
    let mut errors = FieldErrorsBuilder::new();
    validation::check_full_name(&mut errors, "holder_name", &request.holder_name);
    validation::check_email(&mut errors, "holder_email", &request.holder_email);
    errors.finish()?;

    let buyer = repo.get_user(request.user_id).await?;
    let catalog = repo.list_products().await?;
    let product = catalog
        .iter()
        .find(|p| p.id == request.product_id)
        .cloned()
        .ok_or_else(|| DomainError::not_found("product", request.product_id))?;
    let tier = products::tier_for_spec(product.spec);

    let latest = repo.latest_capacity_snapshot().await?;
    let availability = products::evaluate_availability(
        &product,
        capacity::total_sold(&catalog),
        total_cap,
        latest.as_ref(),
    );
    if !availability.available {
        return Err(DomainError::Unavailable {
            reason: availability
                .reason
                .unwrap_or_else(|| "Product unavailable".to_string()),
            waitlist: availability.waitlist_enabled,
        });
    }
    if !capacity::is_tier_available(latest.as_ref(), tier) {
        return Err(DomainError::Unavailable {
            reason: format!("Sales for tier {} are paused", tier),
            waitlist: true,
        });
    }

    let now = Utc::now();
    let price = f64::from(product.price_usd);
    let settled = request.payment_method == PaymentMethod::Card;
    let mut certificate =
        UserCertificate::issue(buyer.id, tier, Some(product.spec), now.date_naive(), price);
    if !settled {
        certificate.status = CertificateStatus::Paused;
    }
    let voucher_id = VoucherId::generate();
    let payment_records = plan_payments(
        &request,
        buyer.id,
        certificate.id,
        voucher_id,
        price * payments::MXN_PER_USD,
        now,
    )?;
    let voucher = CertificateVoucher {
        id: voucher_id,
        voucher_code: payments::voucher_code(now),
        user_id: buyer.id,
        certificate_id: certificate.id,
        certificate_name: product.display_name.clone(),
        weeks_quantity: certificate.weeks_per_year,
        validity_start_date: certificate.start_date,
        validity_end_date: certificate.end_date,
        holder_name: request.holder_name.trim().to_string(),
        holder_email: request.holder_email.trim().to_lowercase(),
        wallet_address: request
            .wallet_address
            .clone()
            .or_else(|| buyer.wallet_address.clone()),
        payment_amount_cents: i64::from(product.price_usd) * 100,
        payment_currency: Currency::Usd,
        payment_method: request.payment_method,
        payment_reference: payment_records
            .first()
            .and_then(|p| p.payment_group_id.clone().or_else(|| Some(p.order_id.clone())))
            .unwrap_or_else(payments::card_order_id),
        payment_date: now,
        status: if settled {
            VoucherStatus::Active
        } else {
            VoucherStatus::Pending
        },
    };

    let claimed = match repo.claim_product_unit(product.id, total_cap).await {
        Ok(claimed) => claimed,
        Err(RepositoryError::Conflict { message, .. }) => {
            return Err(DomainError::Unavailable {
                reason: message,
                waitlist: true,
            })
        }
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = store_purchase(repo, &certificate, &voucher, &payment_records).await {
        if let Err(release) = repo.release_product_unit(product.id).await {
            log::error!(
                "Failed to release unit of {} after aborted purchase: {}",
                product.spec.key(),
                release
            );
        }
        return Err(e);
    }
    log::info!(
        "Certificate {} issued for product {} ({} of {} sold, {})",
        certificate.id,
        claimed.spec.key(),
        claimed.sold_count,
        claimed.beta_cap,
        if settled { "paid" } else { "awaiting payment" }
    );

    if let Some(code) = request.referral_code.as_deref().filter(|c| !c.trim().is_empty()) {
        match create_attribution(repo, code, Some(buyer.email.clone()), Some(buyer.id)).await {
            Ok(_) => {}
            Err(DomainError::Repository(e)) => return Err(e.into()),
            Err(e) => log::warn!("Ignoring referral code '{}': {}", code, e),
        }
    }
    attach_referrer(repo, buyer.id, &buyer.email, now).await?;

    let commissions = if settled {
        process_sale_commissions(repo, buyer.id, price, None, certificate.weeks_per_year).await?
    } else {
        Vec::new()
    };

    let mut payload = serde_json::Map::new();
    payload.insert("product".into(), product.spec.key().into());
    payload.insert("price_usd".into(), product.price_usd.into());
    payload.insert("voucher_code".into(), voucher.voucher_code.clone().into());
    payload.insert(
        "payment_method".into(),
        request.payment_method.as_str().into(),
    );
    log_evidence(
        repo,
        EvidenceEvent {
            event_type: "certificate_purchased".into(),
            entity_type: "certificate".into(),
            entity_id: certificate.id.to_string(),
            user_id: Some(buyer.id.to_string()),
            actor_role: Some(buyer.role.as_str().to_string()),
            payload,
            document_version: None,
            ip_address: None,
            user_agent: None,
        },
    )
    .await?;

    Ok(PurchaseReceipt {
        certificate,
        voucher,
        payments: payment_records,
        commissions,
    })
}

/// Processor orders backing a purchase. Card and SPEI use one order; OXXO
/// splits the MXN amount at the store limit into orders sharing a group id.
fn plan_payments(
    request: &PurchaseRequest,
    user_id: UserId,
    certificate_id: CertificateId,
    voucher_id: VoucherId,
    amount_mxn: f64,
    now: DateTime<Utc>,
) -> DomainResult<Vec<PaymentRecord>> {
    let given_reference = request
        .payment_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let parts = match request.payment_method {
        PaymentMethod::Oxxo => payments::oxxo_partial_payments(amount_mxn)?,
        PaymentMethod::Card | PaymentMethod::Spei => vec![payments::PartialPayment {
            amount: amount_mxn,
            sequence: 1,
            total: 1,
        }],
    };
    let group_id = (parts.len() > 1).then(payments::payment_group_id);
    let status = if request.payment_method == PaymentMethod::Card {
        PaymentStatus::Completed
    } else {
        PaymentStatus::Pending
    };

    Ok(parts
        .iter()
        .map(|part| PaymentRecord {
            id: PaymentId::generate(),
            order_id: match (&given_reference, parts.len()) {
                (Some(reference), 1) => reference.clone(),
                _ => payments::card_order_id(),
            },
            payment_group_id: group_id.clone(),
            user_id,
            certificate_id,
            voucher_id,
            method: request.payment_method,
            amount_mxn: part.amount,
            sequence: part.sequence,
            total_parts: part.total,
            status,
            created_at: now,
            updated_at: now,
        })
        .collect())
}

async fn store_purchase(
    repo: &dyn FullRepository,
    certificate: &UserCertificate,
    voucher: &CertificateVoucher,
    payment_records: &[PaymentRecord],
) -> DomainResult<()> {
    repo.insert_certificate(certificate).await?;
    repo.insert_voucher(voucher).await?;
    repo.insert_payments(payment_records).await?;
    Ok(())
}

/// Place a buyer with no upline under the broker of their active
/// attribution. Returns the edges created.
async fn attach_referrer(
    repo: &dyn FullRepository,
    buyer: UserId,
    email: &str,
    now: DateTime<Utc>,
) -> DomainResult<Vec<ReferralEdge>> {
    if !repo.referral_chain(buyer).await?.is_empty() {
        return Ok(Vec::new());
    }
    let attributions = repo
        .list_attributions_for_lead(Some(buyer), Some(email))
        .await?;
    let active = commissions::pick_active_attribution(&attributions, Some(buyer), None, now)
        .or_else(|| commissions::pick_active_attribution(&attributions, None, Some(email), now));
    let Some(attribution) = active else {
        return Ok(Vec::new());
    };
    if attribution.broker_id == buyer {
        return Ok(Vec::new());
    }

    let upline = repo.referral_chain(attribution.broker_id).await?;
    let edges = commissions::chain_for_new_referral(buyer, attribution.broker_id, &upline);
    repo.insert_referral_edges(&edges).await?;

    if let Ok(mut broker_account) = repo.get_user(attribution.broker_id).await {
        broker_account.referrals_this_month += 1;
        repo.upsert_user(&broker_account).await?;
    }
    log::info!(
        "User {} attributed to broker {} ({} edges)",
        buyer,
        attribution.broker_id,
        edges.len()
    );
    Ok(edges)
}

/// Split a sale across the buyer's referral chain and store the pending
/// commissions.
///
/// The level-1 broker's weeks sold are increased by `weeks` and its level is
/// re-evaluated; failures there are logged and do not fail the sale.
pub async fn process_sale_commissions(
    repo: &dyn FullRepository,
    buyer: UserId,
    sale_amount_usd: f64,
    reservation_id: Option<ReservationId>,
    weeks: u32,
) -> DomainResult<Vec<Commission>> {
    let chain = repo.referral_chain(buyer).await?;
    if chain.is_empty() {
        return Ok(Vec::new());
    }
    let levels = repo.list_broker_levels().await?;

    let mut profiles: HashMap<UserId, BrokerProfile> = HashMap::new();
    for edge in chain.iter().filter(|e| e.level == 1) {
        if let Some(profile) = repo.get_broker_profile(edge.broker_id).await? {
            profiles.insert(edge.broker_id, profile);
        }
    }

    let now = Utc::now();
    let lines = commissions::compute_commissions(sale_amount_usd, &chain, &levels, |id| {
        profiles.get(&id)
    });
    let rows: Vec<Commission> = lines
        .iter()
        .map(|line| commissions::pending_commission(line, sale_amount_usd, reservation_id, now))
        .collect();
    repo.insert_commissions(&rows).await?;

    for line in lines.iter().filter(|l| l.level == 1) {
        if !profiles.contains_key(&line.broker_id) {
            continue;
        }
        if let Err(e) = repo.add_weeks_sold(line.broker_id, weeks).await {
            log::warn!("Failed to add weeks sold for broker {}: {}", line.broker_id, e);
            continue;
        }
        if let Err(e) = evaluate_broker_level(repo, line.broker_id).await {
            log::warn!("Failed to update level for broker {}: {}", line.broker_id, e);
        }
    }

    Ok(rows)
}

// ==================== Payment webhooks ====================

/// Event posted by the payment processor. Only the order id is needed to
/// find the stored payment records.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEventData {
    pub object: PaymentEventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEventObject {
    pub id: String,
    /// Minor units as reported by the processor.
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub received: bool,
    /// Payment records whose status changed.
    pub updated: usize,
    /// Vouchers activated or cancelled by this event.
    pub vouchers: Vec<String>,
}

/// Apply a processor event to the stored payments.
///
/// `order.paid` completes the order's records and, once every record of a
/// voucher is complete, activates the voucher and its certificate and
/// records the sale commissions. `order.pending_payment` and `order.expired`
/// move unpaid records accordingly; an expired order cancels its pending
/// voucher and certificate and returns the product unit. Other event types
/// are acknowledged without changes.
pub async fn handle_payment_event(
    repo: &dyn FullRepository,
    event: PaymentEvent,
) -> DomainResult<WebhookOutcome> {
    let order_id = event.data.object.id.trim().to_string();
    let target = match event.event_type.as_str() {
        "order.paid" => PaymentStatus::Completed,
        "order.pending_payment" => PaymentStatus::Pending,
        "order.expired" => PaymentStatus::Expired,
        "charge.paid" => {
            log::info!(
                "Charge paid for order {} ({:?} minor units)",
                order_id,
                event.data.object.amount
            );
            return Ok(WebhookOutcome::acknowledged());
        }
        other => {
            log::debug!("Ignoring payment event {}", other);
            return Ok(WebhookOutcome::acknowledged());
        }
    };

    let records = repo.list_payments_for_order(&order_id).await?;
    if records.is_empty() {
        log::warn!("Payment event {} for unknown order {}", event.event_type, order_id);
        return Ok(WebhookOutcome::acknowledged());
    }

    let now = Utc::now();
    let mut outcome = WebhookOutcome::acknowledged();
    let mut touched_certificates = Vec::new();
    for mut record in records {
        if record.status == target || record.is_completed() {
            continue;
        }
        record.status = target;
        record.updated_at = now;
        repo.update_payment(&record).await?;
        outcome.updated += 1;
        if !touched_certificates.contains(&record.certificate_id) {
            touched_certificates.push(record.certificate_id);
        }
    }

    for certificate_id in touched_certificates {
        let settled = match target {
            PaymentStatus::Completed => settle_voucher(repo, certificate_id, now).await?,
            PaymentStatus::Expired => cancel_unpaid_voucher(repo, certificate_id).await?,
            PaymentStatus::Pending => None,
        };
        outcome.vouchers.extend(settled);
    }
    log::info!(
        "Payment event {} for order {}: {} records updated",
        event.event_type,
        order_id,
        outcome.updated
    );
    Ok(outcome)
}

impl WebhookOutcome {
    fn acknowledged() -> Self {
        Self {
            received: true,
            updated: 0,
            vouchers: Vec::new(),
        }
    }
}

/// Activate a pending voucher once all of its payments completed. Returns
/// the voucher code when it changed.
async fn settle_voucher(
    repo: &dyn FullRepository,
    certificate_id: CertificateId,
    now: DateTime<Utc>,
) -> DomainResult<Option<String>> {
    let Some(mut voucher) = repo.find_voucher_for_certificate(certificate_id).await? else {
        return Ok(None);
    };
    if voucher.status != VoucherStatus::Pending {
        return Ok(None);
    }
    let records = repo.list_payments_for_voucher(voucher.id).await?;
    let completed = records.iter().filter(|p| p.is_completed()).count() as u32;
    if !records.iter().all(PaymentRecord::is_completed) {
        let progress = payments::payment_progress(completed, records.len() as u32);
        log::info!("Voucher {}: {}", voucher.voucher_code, progress.message);
        return Ok(None);
    }

    voucher.status = VoucherStatus::Active;
    voucher.payment_date = now;
    repo.update_voucher(&voucher).await?;

    let mut certificate = repo.get_certificate(certificate_id).await?;
    if certificate.status == CertificateStatus::Paused {
        certificate.status = CertificateStatus::Active;
        repo.update_certificate(&certificate).await?;
    }
    process_sale_commissions(
        repo,
        certificate.user_id,
        certificate.purchase_price_usd,
        None,
        certificate.weeks_per_year,
    )
    .await?;

    let mut payload = serde_json::Map::new();
    payload.insert("voucher_code".into(), voucher.voucher_code.clone().into());
    payload.insert("payments".into(), records.len().into());
    log_evidence(
        repo,
        EvidenceEvent {
            event_type: "payment_completed".into(),
            entity_type: "certificate".into(),
            entity_id: certificate.id.to_string(),
            user_id: Some(certificate.user_id.to_string()),
            actor_role: None,
            payload,
            document_version: None,
            ip_address: None,
            user_agent: None,
        },
    )
    .await?;
    Ok(Some(voucher.voucher_code))
}

/// Cancel a voucher whose payment window lapsed and give the unit back.
async fn cancel_unpaid_voucher(
    repo: &dyn FullRepository,
    certificate_id: CertificateId,
) -> DomainResult<Option<String>> {
    let Some(mut voucher) = repo.find_voucher_for_certificate(certificate_id).await? else {
        return Ok(None);
    };
    if voucher.status != VoucherStatus::Pending {
        return Ok(None);
    }
    voucher.status = VoucherStatus::Cancelled;
    repo.update_voucher(&voucher).await?;

    let mut certificate = repo.get_certificate(certificate_id).await?;
    certificate.status = CertificateStatus::Cancelled;
    repo.update_certificate(&certificate).await?;

    if let Some(spec) = certificate.product_spec {
        if let Some(product) = repo.find_product_by_spec(spec).await? {
            repo.release_product_unit(product.id).await?;
        }
    }
    log::info!("Voucher {} cancelled after payment expiry", voucher.voucher_code);
    Ok(Some(voucher.voucher_code))
}

// ==================== Brokers ====================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBroker {
    pub user_id: UserId,
    pub referral_code: String,
}

/// Enroll an existing user as a level-1 broker.
pub async fn register_broker(
    repo: &dyn FullRepository,
    request: RegisterBroker,
) -> DomainResult<BrokerProfile> {
    let code = request.referral_code.trim().to_uppercase();
    let mut errors = FieldErrorsBuilder::new();
    errors.check(
        (4..=20).contains(&code.chars().count())
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'),
        "referral_code",
        "Código de referido inválido",
    );
    errors.finish()?;

    repo.get_user(request.user_id).await?;
    let profile = BrokerProfile {
        user_id: request.user_id,
        referral_code: code,
        level_tag: BrokerLevelTag::Broker,
        active: true,
        joined_at: Utc::now(),
        total_weeks_sold: 0,
    };
    repo.upsert_broker_profile(&profile).await?;
    Ok(profile)
}

async fn require_broker(repo: &dyn FullRepository, broker_id: UserId) -> DomainResult<BrokerProfile> {
    repo.get_broker_profile(broker_id)
        .await?
        .ok_or_else(|| DomainError::not_found("broker", broker_id))
}

/// Current performance figures for a broker.
///
/// Affiliates are direct referrals that are themselves active brokers.
pub async fn broker_stats(repo: &dyn FullRepository, broker_id: UserId) -> DomainResult<BrokerStats> {
    let profile = require_broker(repo, broker_id).await?;

    let mut num_affiliates = 0;
    for referred in repo.list_referred(broker_id, 1).await? {
        if let Some(p) = repo.get_broker_profile(referred).await? {
            if p.active {
                num_affiliates += 1;
            }
        }
    }

    let commissions = repo.list_commissions_for_broker(broker_id).await?;
    let years_active = (Utc::now() - profile.joined_at).num_days().max(0) / 365;

    Ok(BrokerStats {
        total_weeks_sold: profile.total_weeks_sold,
        years_active: years_active as u32,
        num_affiliates,
        total_commissions: commissions::totals(&commissions).total,
    })
}

/// Re-evaluate and persist the broker's level.
pub async fn evaluate_broker_level(
    repo: &dyn FullRepository,
    broker_id: UserId,
) -> DomainResult<BrokerLevelTag> {
    let profile = require_broker(repo, broker_id).await?;
    let stats = broker_stats(repo, broker_id).await?;
    let levels = repo.list_broker_levels().await?;
    let tag = commissions::evaluate_level(&levels, &stats);
    if tag != profile.level_tag {
        repo.update_broker_level(broker_id, tag).await?;
        log::info!(
            "Broker {} moved from {} to {}",
            broker_id,
            profile.level_tag,
            tag
        );
    }
    Ok(tag)
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerLevelView {
    pub profile: BrokerProfile,
    pub level: Option<BrokerLevel>,
    pub stats: BrokerStats,
    pub next_level: Option<BrokerLevel>,
    pub progress: Option<LevelProgress>,
}

pub async fn broker_level_view(
    repo: &dyn FullRepository,
    broker_id: UserId,
) -> DomainResult<BrokerLevelView> {
    let profile = require_broker(repo, broker_id).await?;
    let stats = broker_stats(repo, broker_id).await?;
    let levels = repo.list_broker_levels().await?;
    let level = commissions::level_for_tag(&levels, profile.level_tag).cloned();
    let next = commissions::next_level(&levels, profile.level_tag).cloned();
    let progress = next.as_ref().map(|n| commissions::progress_to(n, &stats));
    Ok(BrokerLevelView {
        profile,
        level,
        stats,
        next_level: next,
        progress,
    })
}

pub async fn broker_retirement_bonus(
    repo: &dyn FullRepository,
    broker_id: UserId,
    sale_price_usd: f64,
) -> DomainResult<RetirementBonus> {
    let profile = require_broker(repo, broker_id).await?;
    let levels = repo.list_broker_levels().await?;
    Ok(commissions::retirement_bonus(
        &levels,
        profile.level_tag,
        sale_price_usd,
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerCommissions {
    pub commissions: Vec<Commission>,
    pub totals: CommissionTotals,
}

pub async fn broker_commissions(
    repo: &dyn FullRepository,
    broker_id: UserId,
) -> DomainResult<BrokerCommissions> {
    require_broker(repo, broker_id).await?;
    let commissions = repo.list_commissions_for_broker(broker_id).await?;
    let totals = commissions::totals(&commissions);
    Ok(BrokerCommissions {
        commissions,
        totals,
    })
}

/// Record that a lead arrived through a broker's referral link.
pub async fn create_attribution(
    repo: &dyn FullRepository,
    referral_code: &str,
    lead_email: Option<String>,
    lead_user_id: Option<UserId>,
) -> DomainResult<ReferralAttribution> {
    if lead_email.as_deref().map_or(true, |e| e.trim().is_empty()) && lead_user_id.is_none() {
        return Err(DomainError::invalid(
            "lead",
            "Se requiere email o usuario del prospecto",
        ));
    }
    let broker = repo
        .find_broker_by_code(referral_code)
        .await?
        .filter(|b| b.active)
        .ok_or_else(|| DomainError::invalid("referral_code", "Código de referido inválido"))?;

    let attribution = commissions::new_attribution(&broker, lead_email, lead_user_id, Utc::now());
    repo.insert_attribution(&attribution).await?;
    Ok(attribution)
}

// ==================== Certificates & reservations ====================

pub async fn certificate_eligibility(
    repo: &dyn FullRepository,
    certificate_id: CertificateId,
    today: NaiveDate,
) -> DomainResult<Eligibility> {
    let cert = repo.get_certificate(certificate_id).await?;
    Ok(lifecycle::can_request_reservation(&cert, today))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReservationRequest {
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub desired_start_date: NaiveDate,
    pub desired_end_date: NaiveDate,
    #[serde(default)]
    pub flexibility_days: u32,
    pub party_size: u32,
    #[serde(default)]
    pub destination_preference: Option<String>,
    #[serde(default)]
    pub category_preference: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// Validate and store a usage request in `requested` status.
///
/// Requires a certificate owned by the user that is eligible today, a start
/// date inside the tier's request window and a current reservation consent.
pub async fn submit_reservation_request(
    repo: &dyn FullRepository,
    request: SubmitReservationRequest,
    today: NaiveDate,
) -> DomainResult<ReservationRequest> {
    let mut errors = FieldErrorsBuilder::new();
    errors.check(
        request.party_size >= 1,
        "party_size",
        "El número de huéspedes debe ser al menos 1",
    );
    errors.check(
        request.desired_end_date > request.desired_start_date,
        "desired_end_date",
        "La fecha de salida debe ser posterior a la de llegada",
    );
    let category = match request
        .category_preference
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("any"))
    {
        Some(c) => match c.parse() {
            Ok(cat) => Some(cat),
            Err(_) => {
                errors.push("category_preference", "Categoría inválida");
                None
            }
        },
        None => None,
    };
    errors.finish()?;

    let cert = repo.get_certificate(request.certificate_id).await?;
    if cert.user_id != request.user_id {
        return Err(DomainError::NotEligible(
            "Certificate does not belong to this user".to_string(),
        ));
    }
    let eligibility = lifecycle::can_request_reservation(&cert, today);
    if !eligibility.allowed {
        return Err(DomainError::NotEligible(
            eligibility.reason.unwrap_or_default(),
        ));
    }
    if !lifecycle::within_request_window(&cert, request.desired_start_date, today) {
        return Err(DomainError::NotEligible(format!(
            "Start date must be within {} days from today",
            cert.tier.request_window_days()
        )));
    }

    let consents = repo.list_consents_for_user(request.user_id).await?;
    let check = consent::validate(&consents, ConsentType::Reservation, None, Utc::now());
    if !check.valid {
        return Err(DomainError::ConsentRequired(check.error.unwrap_or_default()));
    }

    let now = Utc::now();
    let stored = ReservationRequest {
        id: RequestId::generate(),
        user_id: request.user_id,
        certificate_id: request.certificate_id,
        desired_start_date: request.desired_start_date,
        desired_end_date: request.desired_end_date,
        flexibility_days: request.flexibility_days,
        party_size: request.party_size,
        destination_preference: request.destination_preference,
        category_preference: category,
        special_requests: request.special_requests,
        status: ReservationRequestStatus::Requested,
        matched_property_id: None,
        created_at: now,
        updated_at: now,
    };
    repo.insert_reservation_request(&stored).await?;
    log::info!(
        "Reservation request {} submitted for certificate {}",
        stored.id,
        stored.certificate_id
    );
    Ok(stored)
}

fn transition(
    request: &mut ReservationRequest,
    next: ReservationRequestStatus,
) -> DomainResult<()> {
    if !request.status.can_transition_to(next) {
        return Err(DomainError::InvalidTransition {
            from: request.status.to_string(),
            to: next.to_string(),
        });
    }
    request.status = next;
    request.updated_at = Utc::now();
    Ok(())
}

/// Offer a property for a request, stepping through `processing` when the
/// request is still `requested`.
pub async fn offer_request(
    repo: &dyn FullRepository,
    request_id: RequestId,
    property_id: PropertyId,
) -> DomainResult<ReservationRequest> {
    let mut request = repo.get_reservation_request(request_id).await?;
    let property = repo.get_property(property_id).await?;
    if !property.is_active() || property.max_occupancy < request.party_size {
        return Err(DomainError::NotEligible(
            "Property cannot host this request".to_string(),
        ));
    }
    if request.status == ReservationRequestStatus::Requested {
        transition(&mut request, ReservationRequestStatus::Processing)?;
    }
    transition(&mut request, ReservationRequestStatus::Offered)?;
    request.matched_property_id = Some(property_id);
    repo.update_reservation_request(&request).await?;
    Ok(request)
}

/// Confirm an offered request: consume one week of the certificate's
/// allowance and block the property for the requested dates.
pub async fn confirm_request(
    repo: &dyn FullRepository,
    request_id: RequestId,
    today: NaiveDate,
) -> DomainResult<ConfirmedReservation> {
    let mut request = repo.get_reservation_request(request_id).await?;
    let property_id = request.matched_property_id.ok_or_else(|| {
        DomainError::NotEligible("Request has no offered property".to_string())
    })?;

    let mut cert = repo.get_certificate(request.certificate_id).await?;
    let eligibility = lifecycle::can_request_reservation(&cert, today);
    if !eligibility.allowed {
        return Err(DomainError::NotEligible(
            eligibility.reason.unwrap_or_default(),
        ));
    }

    let reservations = repo.list_confirmed_reservations().await?;
    let taken = reservations.iter().any(|r| {
        r.property_id == property_id
            && r.blocks(request.desired_start_date, request.desired_end_date)
    });
    if taken {
        return Err(DomainError::Unavailable {
            reason: "Property is no longer available for these dates".to_string(),
            waitlist: false,
        });
    }

    transition(&mut request, ReservationRequestStatus::Confirmed)?;

    cert.remaining_weeks_this_year -= 1;
    let reservation = ConfirmedReservation {
        id: ReservationId::generate(),
        request_id: Some(request.id),
        user_id: request.user_id,
        certificate_id: request.certificate_id,
        property_id,
        check_in: request.desired_start_date,
        check_out: request.desired_end_date,
        party_size: request.party_size,
        status: ConfirmedReservationStatus::Confirmed,
        created_at: Utc::now(),
    };

    repo.update_certificate(&cert).await?;
    repo.insert_confirmed_reservation(&reservation).await?;
    repo.update_reservation_request(&request).await?;
    log::info!(
        "Reservation {} confirmed at property {} ({} weeks left)",
        reservation.id,
        property_id,
        cert.remaining_weeks_this_year
    );
    Ok(reservation)
}

pub async fn cancel_request(
    repo: &dyn FullRepository,
    request_id: RequestId,
    reason: &str,
) -> DomainResult<ReservationRequest> {
    validation::validate_reason(reason)?;
    let mut request = repo.get_reservation_request(request_id).await?;
    transition(&mut request, ReservationRequestStatus::Cancelled)?;
    repo.update_reservation_request(&request).await?;
    log::info!("Reservation request {} cancelled: {}", request.id, reason.trim());
    Ok(request)
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub best: Option<PropertyMatch>,
    pub alternatives: Vec<PropertyMatch>,
}

/// Best property for the options plus up to five alternatives.
pub async fn match_properties(
    repo: &dyn FullRepository,
    options: &MatchOptions,
) -> DomainResult<MatchResult> {
    if options.desired_end_date <= options.desired_start_date {
        return Err(DomainError::invalid(
            "desired_end_date",
            "La fecha de salida debe ser posterior a la de llegada",
        ));
    }
    let properties = repo.list_properties().await?;
    let reservations = repo.list_confirmed_reservations().await?;

    let best = matcher::find_best_match(options, &properties, &reservations);
    let alternatives = match &best {
        Some(m) => matcher::find_alternatives(m.property.id, options, &properties, &reservations),
        None => Vec::new(),
    };
    Ok(MatchResult { best, alternatives })
}

// ==================== Legal compliance ====================

/// Canonicalize, hash and append an event to the evidence log.
pub async fn log_evidence(
    repo: &dyn FullRepository,
    event: EvidenceEvent,
) -> DomainResult<EvidenceRecord> {
    let canonical = evidence::canonicalize(&event, Utc::now());
    let record = evidence::to_record(&event, &canonical);
    repo.insert_evidence(&record).await?;
    log::debug!(
        "Evidence {} logged for {} {}",
        record.event_type,
        record.entity_type,
        record.entity_id
    );
    Ok(record)
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceIntegrity {
    pub id: EvidenceId,
    pub hash_sha256: String,
    pub valid: bool,
}

pub async fn verify_evidence(
    repo: &dyn FullRepository,
    id: EvidenceId,
) -> DomainResult<EvidenceIntegrity> {
    let record = repo.get_evidence(id).await?;
    let valid = evidence::verify_integrity(&record.canonical_json, &record.hash_sha256);
    if !valid {
        log::warn!("Evidence {} failed integrity verification", id);
    }
    Ok(EvidenceIntegrity {
        id,
        hash_sha256: record.hash_sha256,
        valid,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordConsent {
    pub user_id: UserId,
    pub consent_type: ConsentType,
    pub document_version: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Store an acceptance together with the hash of its evidence entry.
pub async fn record_consent(
    repo: &dyn FullRepository,
    request: RecordConsent,
) -> DomainResult<ConsentRecord> {
    let version = request.document_version.trim().to_string();
    if version.is_empty() {
        return Err(DomainError::invalid(
            "document_version",
            "La versión del documento es requerida",
        ));
    }
    let user = repo.get_user(request.user_id).await?;

    let mut payload = serde_json::Map::new();
    payload.insert("consent_type".into(), request.consent_type.as_str().into());
    let record = log_evidence(
        repo,
        EvidenceEvent {
            event_type: "consent_accepted".into(),
            entity_type: "user".into(),
            entity_id: user.id.to_string(),
            user_id: Some(user.id.to_string()),
            actor_role: Some(user.role.as_str().to_string()),
            payload,
            document_version: Some(version.clone()),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
        },
    )
    .await?;

    let consent = ConsentRecord {
        id: ConsentId::generate(),
        user_id: user.id,
        consent_type: request.consent_type,
        document_version: version,
        accepted_at: record.recorded_at,
        ip_address: request.ip_address,
        user_agent: request.user_agent,
        evidence_hash: record.hash_sha256,
    };
    repo.insert_consent(&consent).await?;
    Ok(consent)
}

pub async fn check_consent(
    repo: &dyn FullRepository,
    user_id: UserId,
    consent_type: ConsentType,
    required_version: Option<&str>,
) -> DomainResult<ConsentCheck> {
    let consents = repo.list_consents_for_user(user_id).await?;
    Ok(consent::validate(
        &consents,
        consent_type,
        required_version,
        Utc::now(),
    ))
}

// ==================== Verification ====================

/// Public verification by certificate id, falling back to voucher code.
///
/// The season shown is the season of the ISO week the certificate's latest
/// non-cancelled stay starts in, per the property's seasonal pricing.
pub async fn verify_certificate(
    repo: &dyn FullRepository,
    key: &str,
) -> DomainResult<VerificationView> {
    let key = key.trim();
    if let Ok(id) = key.parse::<CertificateId>() {
        match repo.get_certificate(id).await {
            Ok(cert) => {
                let voucher = repo.find_voucher_for_certificate(id).await?;
                let wallet = repo.get_user(cert.user_id).await.ok().and_then(|u| u.wallet_address);
                let season = certificate_season(repo, cert.id).await?;
                return Ok(verification::build_view(
                    &cert,
                    voucher.as_ref(),
                    wallet.as_deref(),
                    season,
                ));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    let voucher = repo
        .find_voucher_by_code(key)
        .await?
        .ok_or_else(|| DomainError::not_found("certificate", key))?;
    let cert = repo.get_certificate(voucher.certificate_id).await?;
    let season = certificate_season(repo, cert.id).await?;
    Ok(verification::build_view(
        &cert,
        Some(&voucher),
        voucher.wallet_address.as_deref(),
        season,
    ))
}

async fn certificate_season(
    repo: &dyn FullRepository,
    certificate_id: CertificateId,
) -> DomainResult<Option<Season>> {
    let latest = repo
        .list_confirmed_reservations()
        .await?
        .into_iter()
        .filter(|r| {
            r.certificate_id == certificate_id
                && r.status != ConfirmedReservationStatus::Cancelled
        })
        .max_by_key(|r| r.check_in);
    let Some(stay) = latest else {
        return Ok(None);
    };
    match repo.get_property(stay.property_id).await {
        Ok(property) => Ok(property.season_for_week(stay.check_in.iso_week().week())),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ==================== Contact ====================

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

pub async fn submit_contact(
    repo: &dyn FullRepository,
    form: ContactForm,
) -> DomainResult<ContactRequest> {
    validation::validate_contact(
        &form.name,
        &form.email,
        form.phone.as_deref(),
        &form.subject,
        &form.message,
    )?;
    let request = ContactRequest {
        id: ContactRequestId::generate(),
        name: form.name.trim().to_string(),
        email: form.email.trim().to_lowercase(),
        phone: form.phone.filter(|p| !p.trim().is_empty()),
        subject: form.subject.trim().to_string(),
        message: form.message.trim().to_string(),
        created_at: Utc::now(),
    };
    repo.insert_contact_request(&request).await?;
    Ok(request)
}

// ==================== Administration ====================

/// Create the root super admin, or promote the existing account with that
/// email.
pub async fn ensure_root_admin(
    repo: &dyn FullRepository,
    email: &str,
    full_name: &str,
) -> DomainResult<UserAccount> {
    let email = email.trim().to_lowercase();
    let mut errors = FieldErrorsBuilder::new();
    validation::check_email(&mut errors, "email", &email);
    errors.finish()?;

    if let Some(mut user) = repo.find_user_by_email(&email).await? {
        if user.role != UserRole::SuperAdmin {
            log::info!("Promoting {} to super admin", email);
            user.role = UserRole::SuperAdmin;
            repo.upsert_user(&user).await?;
        }
        return Ok(user);
    }

    let user = UserAccount {
        id: UserId::generate(),
        email,
        full_name: full_name.trim().to_string(),
        role: UserRole::SuperAdmin,
        wallet_address: None,
        referrals_this_month: 0,
        created_at: Utc::now(),
    };
    repo.upsert_user(&user).await?;
    log::info!("Root admin {} created", user.email);
    Ok(user)
}

/// Load the acting user and check they may use the admin API with
/// `permission`. Unknown users are refused rather than reported missing.
pub async fn authorize_admin(
    repo: &dyn FullRepository,
    actor: UserId,
    permission: Permission,
) -> DomainResult<UserAccount> {
    let user = match repo.get_user(actor).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            return Err(DomainError::Forbidden(format!("Unknown user {}", actor)))
        }
        Err(e) => return Err(e.into()),
    };
    roles::authorize_admin(user.role, permission)?;
    Ok(user)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleUser {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// Create an account with an explicit role. Only a super admin may create
/// admin accounts.
pub async fn create_role_user(
    repo: &dyn FullRepository,
    actor: UserId,
    request: CreateRoleUser,
) -> DomainResult<UserAccount> {
    let admin = authorize_admin(repo, actor, Permission::ManageUsers).await?;
    if request.role.is_admin() && admin.role != UserRole::SuperAdmin {
        return Err(DomainError::Forbidden(
            "Only a super admin can create admin accounts".into(),
        ));
    }

    let email = request.email.trim().to_lowercase();
    let mut errors = FieldErrorsBuilder::new();
    validation::check_email(&mut errors, "email", &email);
    validation::check_full_name(&mut errors, "full_name", &request.full_name);
    errors.finish()?;

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(DomainError::Conflict(format!(
            "El email {} ya está registrado",
            email
        )));
    }

    let user = UserAccount {
        id: UserId::generate(),
        email,
        full_name: request.full_name.trim().to_string(),
        role: request.role,
        wallet_address: request.wallet_address.filter(|w| !w.trim().is_empty()),
        referrals_this_month: 0,
        created_at: Utc::now(),
    };
    repo.upsert_user(&user).await?;

    let mut payload = serde_json::Map::new();
    payload.insert("role".into(), user.role.as_str().into());
    payload.insert("email".into(), user.email.clone().into());
    log_evidence(
        repo,
        EvidenceEvent {
            event_type: "user_created".into(),
            entity_type: "user".into(),
            entity_id: user.id.to_string(),
            user_id: Some(admin.id.to_string()),
            actor_role: Some(admin.role.as_str().to_string()),
            payload,
            document_version: None,
            ip_address: None,
            user_agent: None,
        },
    )
    .await?;
    log::info!("{} created {} account {}", admin.email, user.role, user.email);
    Ok(user)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProperty {
    pub name: String,
    pub country: String,
    pub city: String,
    pub category: PropertyCategory,
    pub max_occupancy: u32,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f64,
    #[serde(default)]
    pub supply_weeks_per_year: Option<u32>,
    #[serde(default)]
    pub blackout_weeks: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub seasonal_pricing: Vec<SeasonalPricing>,
}

/// Register an active supply property.
pub async fn create_property(
    repo: &dyn FullRepository,
    request: CreateProperty,
) -> DomainResult<SupplyProperty> {
    let mut errors = FieldErrorsBuilder::new();
    errors.check(!request.name.trim().is_empty(), "name", "El nombre es requerido");
    errors.check(!request.country.trim().is_empty(), "country", "El país es requerido");
    errors.check(!request.city.trim().is_empty(), "city", "La ciudad es requerida");
    errors.check(
        request.max_occupancy >= 1,
        "max_occupancy",
        "La ocupación máxima debe ser al menos 1",
    );
    errors.check(
        request.bathrooms >= 0.0,
        "bathrooms",
        "Los baños no pueden ser negativos",
    );
    if let Some(weeks) = request.supply_weeks_per_year {
        errors.check(
            (1..=52).contains(&weeks),
            "supply_weeks_per_year",
            "Las semanas deben estar entre 1 y 52",
        );
    }
    errors.check(
        request.blackout_weeks <= 52,
        "blackout_weeks",
        "Las semanas deben estar entre 0 y 52",
    );
    for pricing in &request.seasonal_pricing {
        validation::check_week_numbers(&mut errors, "seasonal_pricing", &pricing.weeks);
        errors.check(
            pricing.multiplier > 0.0,
            "seasonal_pricing",
            "El multiplicador debe ser positivo",
        );
    }
    errors.finish()?;

    let property = SupplyProperty {
        id: PropertyId::generate(),
        name: request.name.trim().to_string(),
        country: request.country.trim().to_string(),
        city: request.city.trim().to_string(),
        category: request.category,
        max_occupancy: request.max_occupancy,
        bedrooms: request.bedrooms,
        bathrooms: request.bathrooms,
        supply_weeks_per_year: request.supply_weeks_per_year,
        blackout_weeks: request.blackout_weeks,
        status: PropertyStatus::Active,
        amenities: request
            .amenities
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        seasonal_pricing: request.seasonal_pricing,
    };
    repo.upsert_property(&property).await?;
    log::info!("Property {} added in {}", property.name, property.city);
    Ok(property)
}

/// Open or stop sales of one tier. The change is stored as a new snapshot
/// copied from the latest one; the next recalculation derives the flags
/// from utilization again.
pub async fn toggle_sales(
    repo: &dyn FullRepository,
    tier: CertificateTier,
    enabled: bool,
) -> DomainResult<CapacitySnapshot> {
    let mut snapshot = repo
        .latest_capacity_snapshot()
        .await?
        .ok_or_else(|| DomainError::not_found("capacity snapshot", "latest"))?;
    snapshot.id = CapacityStatusId::generate();
    snapshot.sales_enabled.set(tier, enabled);
    snapshot.calculated_at = Utc::now();
    repo.insert_capacity_snapshot(&snapshot).await?;
    log::info!(
        "Sales of {} {}",
        tier,
        if enabled { "opened" } else { "stopped" }
    );
    Ok(snapshot)
}

// ==================== Testimonials ====================

pub const DEFAULT_PUBLIC_TESTIMONIALS: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTestimonial {
    pub user_name: String,
    pub user_email: String,
    #[serde(default)]
    pub user_city: Option<String>,
    #[serde(default)]
    pub certificate_type: Option<String>,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    #[serde(default = "default_true")]
    pub would_recommend: bool,
}

fn default_true() -> bool {
    true
}

/// Store a testimonial awaiting moderation.
pub async fn submit_testimonial(
    repo: &dyn FullRepository,
    request: SubmitTestimonial,
) -> DomainResult<Testimonial> {
    validation::validate_testimonial(
        &request.user_name,
        &request.user_email,
        request.rating,
        &request.title,
        &request.comment,
    )?;
    let testimonial = Testimonial {
        id: TestimonialId::generate(),
        user_name: request.user_name.trim().to_string(),
        user_email: request.user_email.trim().to_lowercase(),
        user_city: request.user_city.filter(|c| !c.trim().is_empty()),
        certificate_type: request.certificate_type.filter(|c| !c.trim().is_empty()),
        rating: request.rating,
        title: request.title.trim().to_string(),
        comment: request.comment.trim().to_string(),
        would_recommend: request.would_recommend,
        status: TestimonialStatus::Pending,
        admin_notes: None,
        reviewed_by: None,
        reviewed_at: None,
        created_at: Utc::now(),
    };
    repo.insert_testimonial(&testimonial).await?;
    Ok(testimonial)
}

/// Approved testimonials, newest first.
pub async fn list_public_testimonials(
    repo: &dyn FullRepository,
    limit: Option<usize>,
) -> DomainResult<Vec<Testimonial>> {
    let mut approved = repo
        .list_testimonials(Some(TestimonialStatus::Approved))
        .await?;
    approved.truncate(limit.unwrap_or(DEFAULT_PUBLIC_TESTIMONIALS));
    Ok(approved)
}

pub async fn list_testimonials_admin(
    repo: &dyn FullRepository,
    status: Option<TestimonialStatus>,
) -> DomainResult<Vec<Testimonial>> {
    Ok(repo.list_testimonials(status).await?)
}

/// Approve or reject a testimonial, recording the reviewer.
pub async fn review_testimonial(
    repo: &dyn FullRepository,
    reviewer: UserId,
    id: TestimonialId,
    status: TestimonialStatus,
    admin_notes: Option<String>,
) -> DomainResult<Testimonial> {
    if status == TestimonialStatus::Pending {
        return Err(DomainError::invalid(
            "status",
            "El estado debe ser approved o rejected",
        ));
    }
    let mut testimonial = repo.get_testimonial(id).await?;
    testimonial.status = status;
    testimonial.admin_notes = admin_notes.filter(|n| !n.trim().is_empty());
    testimonial.reviewed_by = Some(reviewer);
    testimonial.reviewed_at = Some(Utc::now());
    repo.update_testimonial(&testimonial).await?;
    Ok(testimonial)
}

// ==================== Maintenance ====================

/// Restore yearly allowances for certificates past their anniversary.
///
/// # Returns
/// Number of certificates reset.
pub async fn run_annual_reset(repo: &dyn FullRepository, today: NaiveDate) -> DomainResult<usize> {
    let mut count = 0;
    for mut cert in repo.list_certificates().await? {
        if lifecycle::annual_reset(&mut cert, today) {
            repo.update_certificate(&cert).await?;
            count += 1;
        }
    }
    log::info!("Annual reset applied to {} certificates", count);
    Ok(count)
}

/// Expire certificates whose validity has ended.
pub async fn run_expirations(repo: &dyn FullRepository, today: NaiveDate) -> DomainResult<usize> {
    let mut count = 0;
    for mut cert in repo.list_certificates().await? {
        if lifecycle::expire(&mut cert, today) {
            repo.update_certificate(&cert).await?;
            count += 1;
        }
    }
    log::info!("Expired {} certificates", count);
    Ok(count)
}

/// Zero the monthly referral counters and log an audit entry.
pub async fn reset_referral_counters(repo: &dyn FullRepository) -> DomainResult<usize> {
    let count = repo.reset_referral_counters().await?;
    let mut payload = serde_json::Map::new();
    payload.insert("users_reset".into(), count.into());
    log_evidence(
        repo,
        EvidenceEvent {
            event_type: "referral_counters_reset".into(),
            entity_type: "system".into(),
            entity_id: "monthly_referrals".into(),
            user_id: None,
            actor_role: Some("system".into()),
            payload,
            document_version: None,
            ip_address: None,
            user_agent: None,
        },
    )
    .await?;
    log::info!("Monthly referral counters reset for {} users", count);
    Ok(count)
}
