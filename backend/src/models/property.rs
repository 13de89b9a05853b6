//! Supply properties that back certificate usage.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ParseEnumError, PropertyId};

/// Supply weeks assumed for a property that did not declare any.
pub const DEFAULT_SUPPLY_WEEKS_PER_YEAR: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyCategory {
    A,
    B,
    C,
}

impl PropertyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyCategory::A => "A",
            PropertyCategory::B => "B",
            PropertyCategory::C => "C",
        }
    }
}

impl FromStr for PropertyCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(PropertyCategory::A),
            "B" => Ok(PropertyCategory::B),
            "C" => Ok(PropertyCategory::C),
            _ => Err(ParseEnumError::new("property category", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Active,
    Offline,
    Maintenance,
    Removed,
}

impl PropertyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyStatus::Active => "active",
            PropertyStatus::Offline => "offline",
            PropertyStatus::Maintenance => "maintenance",
            PropertyStatus::Removed => "removed",
        }
    }
}

impl FromStr for PropertyStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(PropertyStatus::Active),
            "offline" => Ok(PropertyStatus::Offline),
            "maintenance" => Ok(PropertyStatus::Maintenance),
            "removed" => Ok(PropertyStatus::Removed),
            _ => Err(ParseEnumError::new("property status", s)),
        }
    }
}

/// Demand season of a supply week, derived from its price multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Season {
    UltraHigh,
    High,
    Mid,
    Low,
}

impl Season {
    pub fn from_multiplier(multiplier: f64) -> Self {
        if multiplier >= 2.0 {
            Season::UltraHigh
        } else if multiplier >= 1.5 {
            Season::High
        } else if multiplier <= 0.7 {
            Season::Low
        } else {
            Season::Mid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::UltraHigh => "ultra-high",
            Season::High => "high",
            Season::Mid => "mid",
            Season::Low => "low",
        }
    }
}

/// Price multiplier applied to a set of ISO weeks (1..=52).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPricing {
    pub weeks: Vec<u32>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyProperty {
    pub id: PropertyId,
    pub name: String,
    pub country: String,
    pub city: String,
    pub category: PropertyCategory,
    pub max_occupancy: u32,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub supply_weeks_per_year: Option<u32>,
    pub blackout_weeks: u32,
    pub status: PropertyStatus,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub seasonal_pricing: Vec<SeasonalPricing>,
}

impl SupplyProperty {
    pub fn effective_supply_weeks(&self) -> u32 {
        self.supply_weeks_per_year
            .filter(|weeks| *weeks > 0)
            .unwrap_or(DEFAULT_SUPPLY_WEEKS_PER_YEAR)
    }

    /// Season of an ISO week. Later pricing entries override earlier ones.
    pub fn season_for_week(&self, week: u32) -> Option<Season> {
        self.seasonal_pricing
            .iter()
            .rev()
            .find(|pricing| pricing.weeks.contains(&week))
            .map(|pricing| Season::from_multiplier(pricing.multiplier))
    }

    pub fn is_active(&self) -> bool {
        self.status == PropertyStatus::Active
    }
}
