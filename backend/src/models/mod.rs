//! Domain models for the WEEK-CHAIN backend.
//!
//! These types are shared by the repository layer, the service layer and the
//! HTTP DTOs. Identifiers are UUID newtypes so that ids of different entities
//! can never be mixed up at compile time.

pub mod macros;

pub mod broker;
pub mod capacity;
pub mod certificate;
pub mod contact;
pub mod legal;
pub mod payment;
pub mod property;
pub mod reservation;
pub mod testimonial;
pub mod user;

crate::define_uuid_id!(UserId);
crate::define_uuid_id!(CertificateId);
crate::define_uuid_id!(ProductId);
crate::define_uuid_id!(PropertyId);
crate::define_uuid_id!(RequestId);
crate::define_uuid_id!(ReservationId);
crate::define_uuid_id!(CommissionId);
crate::define_uuid_id!(AttributionId);
crate::define_uuid_id!(ConsentId);
crate::define_uuid_id!(EvidenceId);
crate::define_uuid_id!(VoucherId);
crate::define_uuid_id!(ContactRequestId);
crate::define_uuid_id!(CapacityStatusId);
crate::define_uuid_id!(WaitlistEntryId);
crate::define_uuid_id!(PaymentId);
crate::define_uuid_id!(TestimonialId);

pub use broker::{
    BrokerLevel, BrokerLevelTag, BrokerProfile, Commission, CommissionStatus, ReferralAttribution,
    ReferralEdge,
};
pub use capacity::{CapacitySnapshot, SalesFlags, SystemStatus, TierCounts};
pub use certificate::{
    CertificateProduct, CertificateStatus, CertificateTier, PaxCategory, ProductSpec,
    UserCertificate, WaitlistEntry, WaitlistStatus, CERTIFICATE_VALIDITY_YEARS,
};
pub use contact::ContactRequest;
pub use legal::{ConsentRecord, ConsentType, EvidenceEvent, EvidenceRecord};
pub use payment::{
    CertificateVoucher, Currency, PaymentMethod, PaymentRecord, PaymentStatus, VoucherStatus,
};
pub use property::{PropertyCategory, PropertyStatus, Season, SeasonalPricing, SupplyProperty};
pub use reservation::{
    ConfirmedReservation, ConfirmedReservationStatus, ReservationRequest,
    ReservationRequestStatus,
};
pub use testimonial::{Testimonial, TestimonialStatus};
pub use user::{Permission, UserAccount, UserRole};

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
