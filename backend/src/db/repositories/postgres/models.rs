//! Insertable rows. Every row carries the serialized entity in `data` plus
//! the columns promoted for filtering and constraints.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    broker_levels, broker_profiles, capacity_status, certificate_products, certificate_vouchers,
    commissions, confirmed_reservations, contact_requests, legal_consents, legal_evidence,
    payments, referral_attributions, referral_edges, reservation_requests, supply_properties,
    testimonials, users, user_certificates, waitlist_entries,
};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    BrokerLevel, BrokerProfile, CapacitySnapshot, CertificateProduct, CertificateVoucher,
    Commission, ConfirmedReservation, ConsentRecord, ContactRequest, EvidenceRecord,
    PaymentRecord, ReferralAttribution, ReferralEdge, ReservationRequest, SupplyProperty,
    Testimonial, UserAccount, UserCertificate, WaitlistEntry,
};

pub fn to_doc<T: Serialize>(entity: &T) -> RepositoryResult<Value> {
    serde_json::to_value(entity).map_err(|e| {
        RepositoryError::internal_with_context(
            format!("Failed to serialize row: {}", e),
            ErrorContext::new("to_doc"),
        )
    })
}

pub fn from_doc<T: DeserializeOwned>(data: Value) -> RepositoryResult<T> {
    serde_json::from_value(data).map_err(|e| {
        RepositoryError::internal_with_context(
            format!("Stored row does not match the model: {}", e),
            ErrorContext::new("from_doc"),
        )
    })
}

pub fn from_docs<T: DeserializeOwned>(rows: Vec<Value>) -> RepositoryResult<Vec<T>> {
    rows.into_iter().map(from_doc).collect()
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = supply_properties)]
pub struct PropertyRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub data: Value,
}

impl PropertyRow {
    pub fn from_model(property: &SupplyProperty) -> RepositoryResult<Self> {
        Ok(Self {
            id: property.id.value(),
            name: property.name.clone(),
            status: property.status.as_str().to_string(),
            data: to_doc(property)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = confirmed_reservations)]
pub struct ConfirmedReservationRow {
    pub id: Uuid,
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl ConfirmedReservationRow {
    pub fn from_model(reservation: &ConfirmedReservation) -> RepositoryResult<Self> {
        Ok(Self {
            id: reservation.id.value(),
            property_id: reservation.property_id.value(),
            check_in: reservation.check_in,
            check_out: reservation.check_out,
            status: reservation.status.as_str().to_string(),
            data: to_doc(reservation)?,
            created_at: reservation.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = capacity_status)]
pub struct CapacityRow {
    pub id: Uuid,
    pub system_status: String,
    pub calculated_at: DateTime<Utc>,
    pub data: Value,
}

impl CapacityRow {
    pub fn from_model(snapshot: &CapacitySnapshot) -> RepositoryResult<Self> {
        Ok(Self {
            id: snapshot.id.value(),
            system_status: snapshot.system_status.as_str().to_string(),
            calculated_at: snapshot.calculated_at,
            data: to_doc(snapshot)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = certificate_products)]
pub struct ProductRow {
    pub id: Uuid,
    pub max_pax: i16,
    pub estancias: i16,
    pub sold_count: i32,
    pub data: Value,
}

impl ProductRow {
    pub fn from_model(product: &CertificateProduct) -> RepositoryResult<Self> {
        Ok(Self {
            id: product.id.value(),
            max_pax: i16::from(product.spec.max_pax.guests()),
            estancias: i16::from(product.spec.estancias),
            sold_count: product.sold_count as i32,
            data: to_doc(product)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = waitlist_entries)]
pub struct WaitlistRow {
    pub id: Uuid,
    pub email: String,
    pub status: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl WaitlistRow {
    pub fn from_model(entry: &WaitlistEntry) -> RepositoryResult<Self> {
        Ok(Self {
            id: entry.id.value(),
            email: entry.email.to_lowercase(),
            status: entry.status.as_str().to_string(),
            data: to_doc(entry)?,
            created_at: entry.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub referrals_this_month: i32,
    pub data: Value,
}

impl UserRow {
    pub fn from_model(user: &UserAccount) -> RepositoryResult<Self> {
        Ok(Self {
            id: user.id.value(),
            email: user.email.trim().to_lowercase(),
            referrals_this_month: user.referrals_this_month as i32,
            data: to_doc(user)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = user_certificates)]
pub struct CertificateRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl CertificateRow {
    pub fn from_model(certificate: &UserCertificate) -> RepositoryResult<Self> {
        Ok(Self {
            id: certificate.id.value(),
            user_id: certificate.user_id.value(),
            status: certificate.status.as_str().to_string(),
            created_at: certificate.created_at,
            data: to_doc(certificate)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = certificate_vouchers)]
pub struct VoucherRow {
    pub id: Uuid,
    pub voucher_code: String,
    pub certificate_id: Uuid,
    pub data: Value,
}

impl VoucherRow {
    pub fn from_model(voucher: &CertificateVoucher) -> RepositoryResult<Self> {
        Ok(Self {
            id: voucher.id.value(),
            voucher_code: voucher.voucher_code.to_uppercase(),
            certificate_id: voucher.certificate_id.value(),
            data: to_doc(voucher)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = reservation_requests)]
pub struct RequestRow {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl RequestRow {
    pub fn from_model(request: &ReservationRequest) -> RepositoryResult<Self> {
        Ok(Self {
            id: request.id.value(),
            certificate_id: request.certificate_id.value(),
            status: request.status.as_str().to_string(),
            created_at: request.created_at,
            data: to_doc(request)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = broker_profiles)]
#[diesel(primary_key(user_id))]
pub struct BrokerProfileRow {
    pub user_id: Uuid,
    pub referral_code: String,
    pub data: Value,
}

impl BrokerProfileRow {
    pub fn from_model(profile: &BrokerProfile) -> RepositoryResult<Self> {
        Ok(Self {
            user_id: profile.user_id.value(),
            referral_code: profile.referral_code.to_uppercase(),
            data: to_doc(profile)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = broker_levels)]
pub struct BrokerLevelRow {
    pub tag: String,
    pub level_number: i16,
    pub data: Value,
}

impl BrokerLevelRow {
    pub fn from_model(level: &BrokerLevel) -> RepositoryResult<Self> {
        Ok(Self {
            tag: level.tag.as_str().to_string(),
            level_number: i16::from(level.level_number),
            data: to_doc(level)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Insertable, Queryable)]
#[diesel(table_name = referral_edges)]
pub struct ReferralEdgeRow {
    pub broker_id: Uuid,
    pub referred_user_id: Uuid,
    pub level: i16,
}

impl From<&ReferralEdge> for ReferralEdgeRow {
    fn from(edge: &ReferralEdge) -> Self {
        Self {
            broker_id: edge.broker_id.value(),
            referred_user_id: edge.referred_user_id.value(),
            level: i16::from(edge.level),
        }
    }
}

impl From<ReferralEdgeRow> for ReferralEdge {
    fn from(row: ReferralEdgeRow) -> Self {
        Self {
            broker_id: row.broker_id.into(),
            referred_user_id: row.referred_user_id.into(),
            level: row.level as u8,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = commissions)]
pub struct CommissionRow {
    pub id: Uuid,
    pub broker_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl CommissionRow {
    pub fn from_model(commission: &Commission) -> RepositoryResult<Self> {
        Ok(Self {
            id: commission.id.value(),
            broker_id: commission.broker_id.value(),
            created_at: commission.created_at,
            data: to_doc(commission)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referral_attributions)]
pub struct AttributionRow {
    pub id: Uuid,
    pub broker_id: Uuid,
    pub lead_user_id: Option<Uuid>,
    pub lead_email: Option<String>,
    pub data: Value,
}

impl AttributionRow {
    pub fn from_model(attribution: &ReferralAttribution) -> RepositoryResult<Self> {
        Ok(Self {
            id: attribution.id.value(),
            broker_id: attribution.broker_id.value(),
            lead_user_id: attribution.lead_user_id.map(|id| id.value()),
            lead_email: attribution
                .lead_email
                .as_ref()
                .map(|e| e.trim().to_lowercase()),
            data: to_doc(attribution)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = legal_consents)]
pub struct ConsentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub accepted_at: DateTime<Utc>,
    pub data: Value,
}

impl ConsentRow {
    pub fn from_model(consent: &ConsentRecord) -> RepositoryResult<Self> {
        Ok(Self {
            id: consent.id.value(),
            user_id: consent.user_id.value(),
            accepted_at: consent.accepted_at,
            data: to_doc(consent)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = legal_evidence)]
pub struct EvidenceRow {
    pub id: Uuid,
    pub event_type: String,
    pub hash_sha256: String,
    pub recorded_at: DateTime<Utc>,
    pub data: Value,
}

impl EvidenceRow {
    pub fn from_model(record: &EvidenceRecord) -> RepositoryResult<Self> {
        Ok(Self {
            id: record.id.value(),
            event_type: record.event_type.clone(),
            hash_sha256: record.hash_sha256.clone(),
            recorded_at: record.recorded_at,
            data: to_doc(record)?,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contact_requests)]
pub struct ContactRow {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl ContactRow {
    pub fn from_model(request: &ContactRequest) -> RepositoryResult<Self> {
        Ok(Self {
            id: request.id.value(),
            email: request.email.clone(),
            created_at: request.created_at,
            data: to_doc(request)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub order_id: String,
    pub voucher_id: Uuid,
    pub status: String,
    pub sequence: i32,
    pub data: Value,
}

impl PaymentRow {
    pub fn from_model(payment: &PaymentRecord) -> RepositoryResult<Self> {
        Ok(Self {
            id: payment.id.value(),
            order_id: payment.order_id.clone(),
            voucher_id: payment.voucher_id.value(),
            status: payment.status.as_str().to_string(),
            sequence: payment.sequence as i32,
            data: to_doc(payment)?,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = testimonials)]
pub struct TestimonialRow {
    pub id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl TestimonialRow {
    pub fn from_model(testimonial: &Testimonial) -> RepositoryResult<Self> {
        Ok(Self {
            id: testimonial.id.value(),
            status: testimonial.status.as_str().to_string(),
            created_at: testimonial.created_at,
            data: to_doc(testimonial)?,
        })
    }
}
