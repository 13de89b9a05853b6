//! In-memory repository for development and tests.
//!
//! All tables live behind a single `RwLock`, so every trait method observes
//! a consistent state and multi-row updates are atomic.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::db::repository::supply::ensure_unit_available;
use crate::db::repository::{
    BrokerRepository, CertificateRepository, ComplianceRepository, ErrorContext,
    RepositoryError, RepositoryResult, SupplyRepository,
};
use crate::models::{
    BrokerLevel, BrokerLevelTag, BrokerProfile, CapacitySnapshot, CertificateId,
    CertificateProduct, CertificateVoucher, Commission, ConfirmedReservation, ConsentRecord,
    ContactRequest, EvidenceId, EvidenceRecord, PaymentId, PaymentRecord, ProductId,
    ProductSpec, PropertyId, ReferralAttribution, ReferralEdge, RequestId, ReservationRequest,
    SupplyProperty, Testimonial, TestimonialId, TestimonialStatus, UserAccount,
    UserCertificate, UserId, VoucherId, WaitlistEntry, WaitlistStatus,
};
use crate::services::commissions::default_levels;

#[derive(Debug, Default)]
struct Tables {
    properties: HashMap<PropertyId, SupplyProperty>,
    confirmed: Vec<ConfirmedReservation>,
    snapshots: Vec<CapacitySnapshot>,
    products: HashMap<ProductId, CertificateProduct>,
    waitlist: Vec<WaitlistEntry>,
    users: HashMap<UserId, UserAccount>,
    certificates: HashMap<CertificateId, UserCertificate>,
    vouchers: Vec<CertificateVoucher>,
    payments: HashMap<PaymentId, PaymentRecord>,
    requests: HashMap<RequestId, ReservationRequest>,
    brokers: HashMap<UserId, BrokerProfile>,
    levels: Vec<BrokerLevel>,
    edges: BTreeSet<(UserId, UserId, u8)>,
    commissions: Vec<Commission>,
    attributions: Vec<ReferralAttribution>,
    consents: Vec<ConsentRecord>,
    evidence: HashMap<EvidenceId, EvidenceRecord>,
    contacts: Vec<ContactRequest>,
    testimonials: HashMap<TestimonialId, Testimonial>,
}

/// In-memory implementation of every repository trait.
#[derive(Debug)]
pub struct LocalRepository {
    tables: RwLock<Tables>,
}

impl LocalRepository {
    /// Empty store with the default broker level table.
    pub fn new() -> Self {
        let tables = Tables {
            levels: default_levels(),
            ..Tables::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Replace the broker level table.
    pub fn with_levels(self, levels: Vec<BrokerLevel>) -> Self {
        self.tables.write().levels = levels;
        self
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SupplyRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }

    async fn upsert_property(&self, property: &SupplyProperty) -> RepositoryResult<()> {
        self.tables
            .write()
            .properties
            .insert(property.id, property.clone());
        Ok(())
    }

    async fn get_property(&self, id: PropertyId) -> RepositoryResult<SupplyProperty> {
        self.tables
            .read()
            .properties
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("property", id))
    }

    async fn list_properties(&self) -> RepositoryResult<Vec<SupplyProperty>> {
        let mut properties: Vec<SupplyProperty> =
            self.tables.read().properties.values().cloned().collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(properties)
    }

    async fn insert_confirmed_reservation(
        &self,
        reservation: &ConfirmedReservation,
    ) -> RepositoryResult<()> {
        self.tables.write().confirmed.push(reservation.clone());
        Ok(())
    }

    async fn list_confirmed_reservations(&self) -> RepositoryResult<Vec<ConfirmedReservation>> {
        Ok(self.tables.read().confirmed.clone())
    }

    async fn insert_capacity_snapshot(&self, snapshot: &CapacitySnapshot) -> RepositoryResult<()> {
        self.tables.write().snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn latest_capacity_snapshot(&self) -> RepositoryResult<Option<CapacitySnapshot>> {
        // Ties on `calculated_at` resolve to the most recently inserted row.
        Ok(self
            .tables
            .read()
            .snapshots
            .iter()
            .enumerate()
            .max_by_key(|(idx, s)| (s.calculated_at, *idx))
            .map(|(_, s)| s.clone()))
    }

    async fn upsert_product(&self, product: &CertificateProduct) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        let clash = tables
            .products
            .values()
            .any(|p| p.spec == product.spec && p.id != product.id);
        if clash {
            return Err(RepositoryError::conflict_with_context(
                format!("product {} already exists", product.spec.key()),
                ErrorContext::new("upsert_product").with_entity("certificate_product"),
            ));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> RepositoryResult<CertificateProduct> {
        self.tables
            .read()
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("certificate_product", id))
    }

    async fn find_product_by_spec(
        &self,
        spec: ProductSpec,
    ) -> RepositoryResult<Option<CertificateProduct>> {
        Ok(self
            .tables
            .read()
            .products
            .values()
            .find(|p| p.spec == spec)
            .cloned())
    }

    async fn list_products(&self) -> RepositoryResult<Vec<CertificateProduct>> {
        let mut products: Vec<CertificateProduct> =
            self.tables.read().products.values().cloned().collect();
        products.sort_by_key(|p| (p.spec.max_pax, p.spec.estancias));
        Ok(products)
    }

    async fn claim_product_unit(
        &self,
        id: ProductId,
        total_cap: u32,
    ) -> RepositoryResult<CertificateProduct> {
        let mut tables = self.tables.write();
        let total_sold: u32 = tables.products.values().map(|p| p.sold_count).sum();
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::missing("certificate_product", id))?;
        ensure_unit_available(product, total_sold, total_cap)?;
        product.sold_count += 1;
        Ok(product.clone())
    }

    async fn release_product_unit(&self, id: ProductId) -> RepositoryResult<CertificateProduct> {
        let mut tables = self.tables.write();
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::missing("certificate_product", id))?;
        product.sold_count = product.sold_count.saturating_sub(1);
        Ok(product.clone())
    }

    async fn insert_waitlist_entry(&self, entry: &WaitlistEntry) -> RepositoryResult<()> {
        self.tables.write().waitlist.push(entry.clone());
        Ok(())
    }

    async fn count_waiting(&self) -> RepositoryResult<u32> {
        Ok(self
            .tables
            .read()
            .waitlist
            .iter()
            .filter(|e| e.status == WaitlistStatus::Waiting)
            .count() as u32)
    }
}

#[async_trait]
impl CertificateRepository for LocalRepository {
    async fn upsert_user(&self, user: &UserAccount) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        let email = user.email.to_lowercase();
        let clash = tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email.to_lowercase() == email);
        if clash {
            return Err(RepositoryError::conflict_with_context(
                "email already registered",
                ErrorContext::new("upsert_user").with_entity("user"),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<UserAccount> {
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserAccount>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn reset_referral_counters(&self) -> RepositoryResult<usize> {
        let mut tables = self.tables.write();
        let mut reset = 0;
        for user in tables.users.values_mut() {
            if user.referrals_this_month > 0 {
                user.referrals_this_month = 0;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn insert_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if tables.certificates.contains_key(&certificate.id) {
            return Err(RepositoryError::conflict(format!(
                "certificate {} already exists",
                certificate.id
            )));
        }
        tables
            .certificates
            .insert(certificate.id, certificate.clone());
        Ok(())
    }

    async fn get_certificate(&self, id: CertificateId) -> RepositoryResult<UserCertificate> {
        self.tables
            .read()
            .certificates
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("certificate", id))
    }

    async fn update_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        match tables.certificates.get_mut(&certificate.id) {
            Some(existing) => {
                *existing = certificate.clone();
                Ok(())
            }
            None => Err(RepositoryError::missing("certificate", certificate.id)),
        }
    }

    async fn list_certificates(&self) -> RepositoryResult<Vec<UserCertificate>> {
        let mut certificates: Vec<UserCertificate> =
            self.tables.read().certificates.values().cloned().collect();
        certificates.sort_by_key(|c| (c.created_at, c.id));
        Ok(certificates)
    }

    async fn list_certificates_for_user(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<UserCertificate>> {
        Ok(self
            .list_certificates()
            .await?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect())
    }

    async fn insert_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if tables
            .vouchers
            .iter()
            .any(|v| v.voucher_code == voucher.voucher_code)
        {
            return Err(RepositoryError::conflict_with_context(
                format!("voucher code {} already issued", voucher.voucher_code),
                ErrorContext::new("insert_voucher").with_entity("certificate_voucher"),
            ));
        }
        tables.vouchers.push(voucher.clone());
        Ok(())
    }

    async fn find_voucher_by_code(
        &self,
        code: &str,
    ) -> RepositoryResult<Option<CertificateVoucher>> {
        let code = code.trim();
        Ok(self
            .tables
            .read()
            .vouchers
            .iter()
            .find(|v| v.voucher_code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_voucher_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Option<CertificateVoucher>> {
        Ok(self
            .tables
            .read()
            .vouchers
            .iter()
            .find(|v| v.certificate_id == certificate_id)
            .cloned())
    }

    async fn update_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        match tables.vouchers.iter_mut().find(|v| v.id == voucher.id) {
            Some(existing) => {
                *existing = voucher.clone();
                Ok(())
            }
            None => Err(RepositoryError::missing("certificate_voucher", voucher.id)),
        }
    }

    async fn insert_payments(&self, payments: &[PaymentRecord]) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if let Some(taken) = payments
            .iter()
            .find(|p| tables.payments.values().any(|stored| stored.order_id == p.order_id))
        {
            return Err(RepositoryError::conflict_with_context(
                format!("order {} already recorded", taken.order_id),
                ErrorContext::new("insert_payments").with_entity("payment"),
            ));
        }
        for payment in payments {
            tables.payments.insert(payment.id, payment.clone());
        }
        Ok(())
    }

    async fn list_payments_for_order(
        &self,
        order_id: &str,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        Ok(self
            .tables
            .read()
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_payments_for_voucher(
        &self,
        voucher_id: VoucherId,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        let mut payments: Vec<PaymentRecord> = self
            .tables
            .read()
            .payments
            .values()
            .filter(|p| p.voucher_id == voucher_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.sequence);
        Ok(payments)
    }

    async fn update_payment(&self, payment: &PaymentRecord) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        match tables.payments.get_mut(&payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(RepositoryError::missing("payment", payment.id)),
        }
    }

    async fn insert_reservation_request(
        &self,
        request: &ReservationRequest,
    ) -> RepositoryResult<()> {
        self.tables
            .write()
            .requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get_reservation_request(&self, id: RequestId) -> RepositoryResult<ReservationRequest> {
        self.tables
            .read()
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("reservation_request", id))
    }

    async fn update_reservation_request(
        &self,
        request: &ReservationRequest,
    ) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        match tables.requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(RepositoryError::missing("reservation_request", request.id)),
        }
    }

    async fn list_requests_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Vec<ReservationRequest>> {
        let mut requests: Vec<ReservationRequest> = self
            .tables
            .read()
            .requests
            .values()
            .filter(|r| r.certificate_id == certificate_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }
}

#[async_trait]
impl BrokerRepository for LocalRepository {
    async fn upsert_broker_profile(&self, profile: &BrokerProfile) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        let code = profile.referral_code.to_uppercase();
        let clash = tables
            .brokers
            .values()
            .any(|b| b.user_id != profile.user_id && b.referral_code.to_uppercase() == code);
        if clash {
            return Err(RepositoryError::conflict_with_context(
                format!("referral code {} is taken", profile.referral_code),
                ErrorContext::new("upsert_broker_profile").with_entity("broker_profile"),
            ));
        }
        tables.brokers.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_broker_profile(&self, user_id: UserId) -> RepositoryResult<Option<BrokerProfile>> {
        Ok(self.tables.read().brokers.get(&user_id).cloned())
    }

    async fn find_broker_by_code(&self, code: &str) -> RepositoryResult<Option<BrokerProfile>> {
        let code = code.trim();
        Ok(self
            .tables
            .read()
            .brokers
            .values()
            .find(|b| b.referral_code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn list_broker_levels(&self) -> RepositoryResult<Vec<BrokerLevel>> {
        let mut levels = self.tables.read().levels.clone();
        levels.sort_by_key(|l| l.level_number);
        Ok(levels)
    }

    async fn update_broker_level(
        &self,
        user_id: UserId,
        tag: BrokerLevelTag,
    ) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        let profile = tables
            .brokers
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::missing("broker_profile", user_id))?;
        profile.level_tag = tag;
        Ok(())
    }

    async fn add_weeks_sold(&self, user_id: UserId, weeks: u32) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        let profile = tables
            .brokers
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::missing("broker_profile", user_id))?;
        profile.total_weeks_sold += weeks;
        Ok(())
    }

    async fn referral_chain(&self, user_id: UserId) -> RepositoryResult<Vec<ReferralEdge>> {
        let mut chain: Vec<ReferralEdge> = self
            .tables
            .read()
            .edges
            .iter()
            .filter(|(_, referred, _)| *referred == user_id)
            .map(|&(broker_id, referred_user_id, level)| ReferralEdge {
                broker_id,
                referred_user_id,
                level,
            })
            .collect();
        chain.sort_by_key(|e| e.level);
        Ok(chain)
    }

    async fn insert_referral_edges(&self, edges: &[ReferralEdge]) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        for edge in edges {
            tables
                .edges
                .insert((edge.broker_id, edge.referred_user_id, edge.level));
        }
        Ok(())
    }

    async fn list_referred(&self, broker_id: UserId, level: u8) -> RepositoryResult<Vec<UserId>> {
        Ok(self
            .tables
            .read()
            .edges
            .iter()
            .filter(|(b, _, l)| *b == broker_id && *l == level)
            .map(|(_, referred, _)| *referred)
            .collect())
    }

    async fn insert_commissions(&self, commissions: &[Commission]) -> RepositoryResult<()> {
        self.tables
            .write()
            .commissions
            .extend(commissions.iter().cloned());
        Ok(())
    }

    async fn list_commissions_for_broker(
        &self,
        broker_id: UserId,
    ) -> RepositoryResult<Vec<Commission>> {
        let mut commissions: Vec<Commission> = self
            .tables
            .read()
            .commissions
            .iter()
            .filter(|c| c.broker_id == broker_id)
            .cloned()
            .collect();
        commissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(commissions)
    }

    async fn insert_attribution(&self, attribution: &ReferralAttribution) -> RepositoryResult<()> {
        self.tables.write().attributions.push(attribution.clone());
        Ok(())
    }

    async fn list_attributions_for_lead(
        &self,
        user_id: Option<UserId>,
        email: Option<&str>,
    ) -> RepositoryResult<Vec<ReferralAttribution>> {
        let email = email.map(|e| e.trim().to_lowercase());
        Ok(self
            .tables
            .read()
            .attributions
            .iter()
            .filter(|a| {
                let by_user = user_id.is_some() && a.lead_user_id == user_id;
                let by_email = match (&email, &a.lead_email) {
                    (Some(wanted), Some(stored)) => stored.to_lowercase() == *wanted,
                    _ => false,
                };
                by_user || by_email
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ComplianceRepository for LocalRepository {
    async fn insert_consent(&self, consent: &ConsentRecord) -> RepositoryResult<()> {
        self.tables.write().consents.push(consent.clone());
        Ok(())
    }

    async fn list_consents_for_user(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<ConsentRecord>> {
        Ok(self
            .tables
            .read()
            .consents
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_evidence(&self, record: &EvidenceRecord) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if tables.evidence.contains_key(&record.id) {
            return Err(RepositoryError::conflict(format!(
                "evidence {} is immutable",
                record.id
            )));
        }
        tables.evidence.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_evidence(&self, id: EvidenceId) -> RepositoryResult<EvidenceRecord> {
        self.tables
            .read()
            .evidence
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("evidence", id))
    }

    async fn insert_contact_request(&self, request: &ContactRequest) -> RepositoryResult<()> {
        self.tables.write().contacts.push(request.clone());
        Ok(())
    }

    async fn list_contact_requests(&self) -> RepositoryResult<Vec<ContactRequest>> {
        let mut contacts = self.tables.read().contacts.clone();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }

    async fn insert_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()> {
        self.tables
            .write()
            .testimonials
            .insert(testimonial.id, testimonial.clone());
        Ok(())
    }

    async fn get_testimonial(&self, id: TestimonialId) -> RepositoryResult<Testimonial> {
        self.tables
            .read()
            .testimonials
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing("testimonial", id))
    }

    async fn update_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        match tables.testimonials.get_mut(&testimonial.id) {
            Some(existing) => {
                *existing = testimonial.clone();
                Ok(())
            }
            None => Err(RepositoryError::missing("testimonial", testimonial.id)),
        }
    }

    async fn list_testimonials(
        &self,
        status: Option<TestimonialStatus>,
    ) -> RepositoryResult<Vec<Testimonial>> {
        let mut testimonials: Vec<Testimonial> = self
            .tables
            .read()
            .testimonials
            .values()
            .filter(|t| status.map_or(true, |wanted| t.status == wanted))
            .cloned()
            .collect();
        testimonials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(testimonials)
    }
}
