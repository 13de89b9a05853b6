//! Broker network repository: profiles, levels, referral edges, commissions
//! and referral-link attributions.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    BrokerLevel, BrokerLevelTag, BrokerProfile, Commission, ReferralAttribution, ReferralEdge,
    UserId,
};

/// Repository trait for the referral network.
#[async_trait]
pub trait BrokerRepository: Send + Sync {
    // ==================== Profiles & levels ====================

    async fn upsert_broker_profile(&self, profile: &BrokerProfile) -> RepositoryResult<()>;

    async fn get_broker_profile(&self, user_id: UserId) -> RepositoryResult<Option<BrokerProfile>>;

    /// Codes compare case-insensitively.
    async fn find_broker_by_code(&self, code: &str) -> RepositoryResult<Option<BrokerProfile>>;

    /// Level table ordered by `level_number`.
    async fn list_broker_levels(&self) -> RepositoryResult<Vec<BrokerLevel>>;

    async fn update_broker_level(
        &self,
        user_id: UserId,
        tag: BrokerLevelTag,
    ) -> RepositoryResult<()>;

    /// Add `weeks` to the broker's lifetime total.
    async fn add_weeks_sold(&self, user_id: UserId, weeks: u32) -> RepositoryResult<()>;

    // ==================== Referral graph ====================

    /// Edges pointing at `user_id`, ascending by level.
    async fn referral_chain(&self, user_id: UserId) -> RepositoryResult<Vec<ReferralEdge>>;

    /// Ignores edges that already exist.
    async fn insert_referral_edges(&self, edges: &[ReferralEdge]) -> RepositoryResult<()>;

    /// Users referred by `broker_id` at exactly `level`.
    async fn list_referred(&self, broker_id: UserId, level: u8) -> RepositoryResult<Vec<UserId>>;

    // ==================== Commissions ====================

    async fn insert_commissions(&self, commissions: &[Commission]) -> RepositoryResult<()>;

    /// Newest first.
    async fn list_commissions_for_broker(
        &self,
        broker_id: UserId,
    ) -> RepositoryResult<Vec<Commission>>;

    // ==================== Attributions ====================

    async fn insert_attribution(&self, attribution: &ReferralAttribution) -> RepositoryResult<()>;

    /// Attributions whose lead matches the user id or (lower-cased) email.
    async fn list_attributions_for_lead(
        &self,
        user_id: Option<UserId>,
        email: Option<&str>,
    ) -> RepositoryResult<Vec<ReferralAttribution>>;
}
