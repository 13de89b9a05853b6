//! Stored capacity snapshots and system health status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CapacityStatusId, CertificateTier, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatus {
    Green,
    Yellow,
    /// Only ever read back from stored rows; thresholds never produce it.
    Orange,
    Red,
}

impl SystemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemStatus::Green => "GREEN",
            SystemStatus::Yellow => "YELLOW",
            SystemStatus::Orange => "ORANGE",
            SystemStatus::Red => "RED",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GREEN" => Ok(SystemStatus::Green),
            "YELLOW" => Ok(SystemStatus::Yellow),
            "ORANGE" => Ok(SystemStatus::Orange),
            "RED" => Ok(SystemStatus::Red),
            _ => Err(ParseEnumError::new("system status", s)),
        }
    }
}

/// Per-tier counts of active certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub silver: u32,
    pub gold: u32,
    pub platinum: u32,
    pub signature: u32,
}

impl TierCounts {
    pub fn get(&self, tier: CertificateTier) -> u32 {
        match tier {
            CertificateTier::Silver => self.silver,
            CertificateTier::Gold => self.gold,
            CertificateTier::Platinum => self.platinum,
            CertificateTier::Signature => self.signature,
        }
    }

    pub fn increment(&mut self, tier: CertificateTier) {
        match tier {
            CertificateTier::Silver => self.silver += 1,
            CertificateTier::Gold => self.gold += 1,
            CertificateTier::Platinum => self.platinum += 1,
            CertificateTier::Signature => self.signature += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.silver + self.gold + self.platinum + self.signature
    }
}

/// Which tiers may currently be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFlags {
    pub silver: bool,
    pub gold: bool,
    pub platinum: bool,
    pub signature: bool,
}

impl SalesFlags {
    pub const ALL_OPEN: SalesFlags = SalesFlags {
        silver: true,
        gold: true,
        platinum: true,
        signature: true,
    };

    pub fn is_enabled(&self, tier: CertificateTier) -> bool {
        match tier {
            CertificateTier::Silver => self.silver,
            CertificateTier::Gold => self.gold,
            CertificateTier::Platinum => self.platinum,
            CertificateTier::Signature => self.signature,
        }
    }

    pub fn set(&mut self, tier: CertificateTier, enabled: bool) {
        let flag = match tier {
            CertificateTier::Silver => &mut self.silver,
            CertificateTier::Gold => &mut self.gold,
            CertificateTier::Platinum => &mut self.platinum,
            CertificateTier::Signature => &mut self.signature,
        };
        *flag = enabled;
    }

    pub fn any_stopped(&self) -> bool {
        !(self.silver && self.gold && self.platinum && self.signature)
    }
}

/// One recalculation of system capacity. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub id: CapacityStatusId,
    pub total_properties: u32,
    pub active_properties: u32,
    pub total_supply_weeks: u32,
    pub safe_capacity: u32,
    pub active_certificates: TierCounts,
    pub projected_demand: f64,
    pub utilization_pct: f64,
    pub system_status: SystemStatus,
    pub sales_enabled: SalesFlags,
    pub waitlist_active: bool,
    pub waitlist_count: u32,
    pub calculated_at: DateTime<Utc>,
}
