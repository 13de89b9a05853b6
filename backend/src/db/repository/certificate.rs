//! Demand-side repository: accounts, certificates, vouchers, payments and
//! usage requests.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    CertificateId, CertificateVoucher, PaymentRecord, RequestId, ReservationRequest,
    UserAccount, UserCertificate, UserId, VoucherId,
};

/// Repository trait for certificate holders and their certificates.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    // ==================== Accounts ====================

    async fn upsert_user(&self, user: &UserAccount) -> RepositoryResult<()>;

    async fn get_user(&self, id: UserId) -> RepositoryResult<UserAccount>;

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserAccount>>;

    /// Zero every non-zero monthly referral counter.
    ///
    /// # Returns
    /// Number of accounts that were reset.
    async fn reset_referral_counters(&self) -> RepositoryResult<usize>;

    // ==================== Certificates ====================

    async fn insert_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()>;

    async fn get_certificate(&self, id: CertificateId) -> RepositoryResult<UserCertificate>;

    /// Replace a stored certificate. Fails with `NotFound` for unknown ids.
    async fn update_certificate(&self, certificate: &UserCertificate) -> RepositoryResult<()>;

    async fn list_certificates(&self) -> RepositoryResult<Vec<UserCertificate>>;

    async fn list_certificates_for_user(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<UserCertificate>>;

    // ==================== Vouchers ====================

    /// Voucher codes are unique; a duplicate yields `Conflict`.
    async fn insert_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()>;

    async fn find_voucher_by_code(&self, code: &str)
        -> RepositoryResult<Option<CertificateVoucher>>;

    async fn find_voucher_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Option<CertificateVoucher>>;

    /// Replace a stored voucher. Fails with `NotFound` for unknown ids.
    async fn update_voucher(&self, voucher: &CertificateVoucher) -> RepositoryResult<()>;

    // ==================== Payments ====================

    async fn insert_payments(&self, payments: &[PaymentRecord]) -> RepositoryResult<()>;

    /// Records created for a processor order id.
    async fn list_payments_for_order(&self, order_id: &str)
        -> RepositoryResult<Vec<PaymentRecord>>;

    /// Every record backing a voucher, ordered by `sequence`.
    async fn list_payments_for_voucher(
        &self,
        voucher_id: VoucherId,
    ) -> RepositoryResult<Vec<PaymentRecord>>;

    async fn update_payment(&self, payment: &PaymentRecord) -> RepositoryResult<()>;

    // ==================== Usage requests ====================

    async fn insert_reservation_request(&self, request: &ReservationRequest)
        -> RepositoryResult<()>;

    async fn get_reservation_request(&self, id: RequestId) -> RepositoryResult<ReservationRequest>;

    async fn update_reservation_request(
        &self,
        request: &ReservationRequest,
    ) -> RepositoryResult<()>;

    async fn list_requests_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> RepositoryResult<Vec<ReservationRequest>>;
}
