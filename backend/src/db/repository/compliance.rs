//! Legal compliance repository: consents, the evidence log, inbound
//! contact requests and moderated testimonials.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    ConsentRecord, ContactRequest, EvidenceId, EvidenceRecord, Testimonial, TestimonialId,
    TestimonialStatus, UserId,
};

#[async_trait]
pub trait ComplianceRepository: Send + Sync {
    async fn insert_consent(&self, consent: &ConsentRecord) -> RepositoryResult<()>;

    async fn list_consents_for_user(&self, user_id: UserId)
        -> RepositoryResult<Vec<ConsentRecord>>;

    /// The evidence log is append-only.
    async fn insert_evidence(&self, record: &EvidenceRecord) -> RepositoryResult<()>;

    async fn get_evidence(&self, id: EvidenceId) -> RepositoryResult<EvidenceRecord>;

    async fn insert_contact_request(&self, request: &ContactRequest) -> RepositoryResult<()>;

    /// Newest first.
    async fn list_contact_requests(&self) -> RepositoryResult<Vec<ContactRequest>>;

    async fn insert_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()>;

    async fn get_testimonial(&self, id: TestimonialId) -> RepositoryResult<Testimonial>;

    async fn update_testimonial(&self, testimonial: &Testimonial) -> RepositoryResult<()>;

    /// Newest first, optionally restricted to one status.
    async fn list_testimonials(
        &self,
        status: Option<TestimonialStatus>,
    ) -> RepositoryResult<Vec<Testimonial>>;
}
