//! Supply-side repository: properties, confirmed stays, capacity snapshots
//! and the PAX product catalog.

use async_trait::async_trait;

use super::error::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    CapacitySnapshot, CertificateProduct, ConfirmedReservation, ProductId, ProductSpec,
    PropertyId, SupplyProperty, WaitlistEntry,
};

/// Repository trait for inventory and capacity data.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait SupplyRepository: Send + Sync {
    /// Check that the backing store answers.
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Properties ====================

    /// Insert or replace a property by id.
    async fn upsert_property(&self, property: &SupplyProperty) -> RepositoryResult<()>;

    async fn get_property(&self, id: PropertyId) -> RepositoryResult<SupplyProperty>;

    /// All properties regardless of status, ordered by name.
    async fn list_properties(&self) -> RepositoryResult<Vec<SupplyProperty>>;

    // ==================== Confirmed reservations ====================

    async fn insert_confirmed_reservation(
        &self,
        reservation: &ConfirmedReservation,
    ) -> RepositoryResult<()>;

    /// Every confirmed reservation, cancelled ones included.
    async fn list_confirmed_reservations(&self) -> RepositoryResult<Vec<ConfirmedReservation>>;

    // ==================== Capacity ====================

    /// Append a snapshot; snapshots are never updated.
    async fn insert_capacity_snapshot(&self, snapshot: &CapacitySnapshot) -> RepositoryResult<()>;

    /// Snapshot with the newest `calculated_at`, if any.
    async fn latest_capacity_snapshot(&self) -> RepositoryResult<Option<CapacitySnapshot>>;

    // ==================== Product catalog ====================

    /// Insert or replace a product. The `(max_pax, estancias)` pair is unique.
    async fn upsert_product(&self, product: &CertificateProduct) -> RepositoryResult<()>;

    async fn get_product(&self, id: ProductId) -> RepositoryResult<CertificateProduct>;

    async fn find_product_by_spec(
        &self,
        spec: ProductSpec,
    ) -> RepositoryResult<Option<CertificateProduct>>;

    /// Catalog ordered by pax then estancias.
    async fn list_products(&self) -> RepositoryResult<Vec<CertificateProduct>>;

    /// Take one unit when both the product's beta cap and the catalog-wide
    /// `total_cap` have room, returning the updated product. The check and
    /// the increment are one atomic step; a full cap fails with
    /// [`RepositoryError::Conflict`] and leaves every count unchanged.
    async fn claim_product_unit(
        &self,
        id: ProductId,
        total_cap: u32,
    ) -> RepositoryResult<CertificateProduct>;

    /// Return a unit taken by [`claim_product_unit`](Self::claim_product_unit).
    /// The count never drops below zero.
    async fn release_product_unit(&self, id: ProductId) -> RepositoryResult<CertificateProduct>;

    // ==================== Waitlist ====================

    async fn insert_waitlist_entry(&self, entry: &WaitlistEntry) -> RepositoryResult<()>;

    /// Number of entries still in `waiting` status.
    async fn count_waiting(&self) -> RepositoryResult<u32>;
}

/// Cap check run by every `claim_product_unit` implementation while it holds
/// the catalog lock.
pub(crate) fn ensure_unit_available(
    product: &CertificateProduct,
    total_sold: u32,
    total_cap: u32,
) -> RepositoryResult<()> {
    let reason = if product.sold_count >= product.beta_cap {
        "Product beta cap reached"
    } else if total_sold >= total_cap {
        "Global beta cap reached"
    } else {
        return Ok(());
    };
    Err(RepositoryError::conflict_with_context(
        reason,
        ErrorContext::new("claim_product_unit")
            .with_entity("certificate_product")
            .with_entity_id(product.id.to_string()),
    ))
}
