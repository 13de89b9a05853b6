//! Broker profiles, referral network edges and commissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AttributionId, CommissionId, ParseEnumError, ReservationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerLevelTag {
    Broker,
    SilverBroker,
    BrokerElite,
}

impl BrokerLevelTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BrokerLevelTag::Broker => "BROKER",
            BrokerLevelTag::SilverBroker => "SILVER_BROKER",
            BrokerLevelTag::BrokerElite => "BROKER_ELITE",
        }
    }
}

impl fmt::Display for BrokerLevelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerLevelTag {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BROKER" => Ok(BrokerLevelTag::Broker),
            "SILVER_BROKER" => Ok(BrokerLevelTag::SilverBroker),
            "BROKER_ELITE" => Ok(BrokerLevelTag::BrokerElite),
            _ => Err(ParseEnumError::new("broker level", s)),
        }
    }
}

/// Thresholds and rates for one broker level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerLevel {
    pub tag: BrokerLevelTag,
    pub level_number: u8,
    pub display_name: String,
    pub direct_commission_rate: f64,
    pub min_weeks_sold: u32,
    pub min_active_affiliates: u32,
    pub retirement_bonus_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerProfile {
    pub user_id: UserId,
    pub referral_code: String,
    pub level_tag: BrokerLevelTag,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
    pub total_weeks_sold: u32,
}

/// `broker_id` sits `level` hops above `referred_user_id` in the referral tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub broker_id: UserId,
    pub referred_user_id: UserId,
    pub level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(CommissionStatus::Pending),
            "approved" => Ok(CommissionStatus::Approved),
            "paid" => Ok(CommissionStatus::Paid),
            "cancelled" => Ok(CommissionStatus::Cancelled),
            _ => Err(ParseEnumError::new("commission status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub broker_id: UserId,
    pub reservation_id: Option<ReservationId>,
    pub sale_amount_usd: f64,
    pub rate: f64,
    pub amount_usd: f64,
    pub referral_level: u8,
    pub level_tag: Option<BrokerLevelTag>,
    pub status: CommissionStatus,
    pub hold_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralAttribution {
    pub id: AttributionId,
    pub referral_code: String,
    pub broker_id: UserId,
    pub lead_email: Option<String>,
    pub lead_user_id: Option<UserId>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReferralAttribution {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
