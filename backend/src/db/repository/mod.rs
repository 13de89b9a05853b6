//! Repository traits.
//!
//! Storage is split by concern. Backends implement all four traits and get
//! [`FullRepository`] for free, which is what the service layer and the
//! global singleton work with.

pub mod broker;
pub mod certificate;
pub mod compliance;
pub mod error;
pub mod supply;

pub use broker::BrokerRepository;
pub use certificate::CertificateRepository;
pub use compliance::ComplianceRepository;
pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use supply::SupplyRepository;

/// Every storage concern the service layer needs.
pub trait FullRepository:
    SupplyRepository + CertificateRepository + BrokerRepository + ComplianceRepository
{
}

impl<T> FullRepository for T where
    T: SupplyRepository + CertificateRepository + BrokerRepository + ComplianceRepository
{
}
