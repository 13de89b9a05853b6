//! Certificate tiers, PAX products and issued user certificates.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CertificateId, ParseEnumError, ProductId, UserId, WaitlistEntryId};

/// Years a Smart Vacational Certificate stays valid after purchase.
pub const CERTIFICATE_VALIDITY_YEARS: i32 = 15;

/// Legacy tiered certificate products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateTier {
    Silver,
    Gold,
    Platinum,
    Signature,
}

impl CertificateTier {
    pub const ALL: [CertificateTier; 4] = [
        CertificateTier::Silver,
        CertificateTier::Gold,
        CertificateTier::Platinum,
        CertificateTier::Signature,
    ];

    /// Weeks of usage included per certificate year.
    pub fn weeks_per_year(self) -> u32 {
        match self {
            CertificateTier::Silver => 1,
            CertificateTier::Gold => 1,
            CertificateTier::Platinum => 2,
            CertificateTier::Signature => 4,
        }
    }

    /// Fraction of included weeks a holder is expected to actually request.
    pub fn expected_usage_rate(self) -> f64 {
        match self {
            CertificateTier::Silver => 0.55,
            CertificateTier::Gold => 0.70,
            CertificateTier::Platinum => 0.80,
            CertificateTier::Signature => 0.85,
        }
    }

    pub fn price_usd(self) -> u32 {
        match self {
            CertificateTier::Silver => 3_500,
            CertificateTier::Gold => 6_000,
            CertificateTier::Platinum => 11_500,
            CertificateTier::Signature => 21_000,
        }
    }

    /// How many days ahead of the stay a usage request may be filed.
    pub fn request_window_days(self) -> i64 {
        match self {
            CertificateTier::Silver => 90,
            CertificateTier::Gold => 180,
            CertificateTier::Platinum | CertificateTier::Signature => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CertificateTier::Silver => "Silver",
            CertificateTier::Gold => "Gold",
            CertificateTier::Platinum => "Platinum",
            CertificateTier::Signature => "Signature",
        }
    }
}

impl fmt::Display for CertificateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silver" => Ok(CertificateTier::Silver),
            "gold" => Ok(CertificateTier::Gold),
            "platinum" => Ok(CertificateTier::Platinum),
            "signature" => Ok(CertificateTier::Signature),
            _ => Err(ParseEnumError::new("certificate tier", s)),
        }
    }
}

/// Party-size buckets sold by the PAX catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PaxCategory {
    Two,
    Four,
    Six,
    Eight,
}

impl PaxCategory {
    pub const ALL: [PaxCategory; 4] = [
        PaxCategory::Two,
        PaxCategory::Four,
        PaxCategory::Six,
        PaxCategory::Eight,
    ];

    pub fn guests(self) -> u8 {
        match self {
            PaxCategory::Two => 2,
            PaxCategory::Four => 4,
            PaxCategory::Six => 6,
            PaxCategory::Eight => 8,
        }
    }

    /// Smallest category that fits the party.
    pub fn for_party_size(party_size: u32) -> Self {
        match party_size {
            0..=2 => PaxCategory::Two,
            3..=4 => PaxCategory::Four,
            5..=6 => PaxCategory::Six,
            _ => PaxCategory::Eight,
        }
    }
}

impl TryFrom<u8> for PaxCategory {
    type Error = ParseEnumError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(PaxCategory::Two),
            4 => Ok(PaxCategory::Four),
            6 => Ok(PaxCategory::Six),
            8 => Ok(PaxCategory::Eight),
            other => Err(ParseEnumError::new("pax category", other.to_string())),
        }
    }
}

impl From<PaxCategory> for u8 {
    fn from(value: PaxCategory) -> Self {
        value.guests()
    }
}

/// A PAX product: maximum guests and stays ("estancias") per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawProductSpec")]
pub struct ProductSpec {
    pub max_pax: PaxCategory,
    pub estancias: u8,
}

#[derive(Deserialize)]
struct RawProductSpec {
    max_pax: PaxCategory,
    estancias: u8,
}

impl TryFrom<RawProductSpec> for ProductSpec {
    type Error = ParseEnumError;

    fn try_from(raw: RawProductSpec) -> Result<Self, Self::Error> {
        ProductSpec::new(raw.max_pax, raw.estancias)
    }
}

impl ProductSpec {
    pub const MIN_ESTANCIAS: u8 = 1;
    pub const MAX_ESTANCIAS: u8 = 4;

    /// Build a spec, rejecting stays outside 1..=4.
    pub fn new(max_pax: PaxCategory, estancias: u8) -> Result<Self, ParseEnumError> {
        if !(Self::MIN_ESTANCIAS..=Self::MAX_ESTANCIAS).contains(&estancias) {
            return Err(ParseEnumError::new("estancias", estancias.to_string()));
        }
        Ok(Self { max_pax, estancias })
    }

    /// Catalog key such as `"4_2"`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.max_pax.guests(), self.estancias)
    }
}

impl FromStr for ProductSpec {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pax, stays) = s
            .split_once('_')
            .ok_or_else(|| ParseEnumError::new("product key", s))?;
        let pax: u8 = pax
            .parse()
            .map_err(|_| ParseEnumError::new("product key", s))?;
        let stays: u8 = stays
            .parse()
            .map_err(|_| ParseEnumError::new("product key", s))?;
        ProductSpec::new(PaxCategory::try_from(pax)?, stays)
    }
}

/// A sellable product from the PAX catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateProduct {
    pub id: ProductId,
    pub spec: ProductSpec,
    pub price_usd: u32,
    pub display_name: String,
    pub description: String,
    pub is_active: bool,
    pub sales_enabled: bool,
    pub beta_cap: u32,
    pub sold_count: u32,
}

impl CertificateProduct {
    pub fn remaining_for_product(&self) -> i64 {
        i64::from(self.beta_cap) - i64::from(self.sold_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Active,
    Paused,
    Expired,
    Cancelled,
}

impl CertificateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateStatus::Active => "active",
            CertificateStatus::Paused => "paused",
            CertificateStatus::Expired => "expired",
            CertificateStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for CertificateStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(CertificateStatus::Active),
            "paused" => Ok(CertificateStatus::Paused),
            "expired" => Ok(CertificateStatus::Expired),
            "cancelled" => Ok(CertificateStatus::Cancelled),
            _ => Err(ParseEnumError::new("certificate status", s)),
        }
    }
}

/// A certificate held by a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCertificate {
    pub id: CertificateId,
    pub user_id: UserId,
    pub tier: CertificateTier,
    pub product_spec: Option<ProductSpec>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CertificateStatus,
    pub weeks_per_year: u32,
    pub remaining_weeks_this_year: u32,
    pub year_start_date: NaiveDate,
    pub purchase_price_usd: f64,
    pub created_at: DateTime<Utc>,
}

impl UserCertificate {
    /// Issue a new active certificate starting on `purchase_date`.
    ///
    /// PAX products carry their stays per year as the weekly allowance;
    /// tiered products use the tier table.
    pub fn issue(
        user_id: UserId,
        tier: CertificateTier,
        product_spec: Option<ProductSpec>,
        purchase_date: NaiveDate,
        purchase_price_usd: f64,
    ) -> Self {
        let weeks_per_year = product_spec
            .map(|spec| u32::from(spec.estancias))
            .unwrap_or_else(|| tier.weeks_per_year());
        Self {
            id: CertificateId::generate(),
            user_id,
            tier,
            product_spec,
            start_date: purchase_date,
            end_date: add_years(purchase_date, CERTIFICATE_VALIDITY_YEARS),
            status: CertificateStatus::Active,
            weeks_per_year,
            remaining_weeks_this_year: weeks_per_year,
            year_start_date: purchase_date,
            purchase_price_usd,
            created_at: Utc::now(),
        }
    }
}

/// Shift a date by whole years, clamping Feb 29 to Feb 28 when needed.
pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    let target_year = date.year() + years;
    date.with_year(target_year)
        .or_else(|| NaiveDate::from_ymd_opt(target_year, date.month(), 28))
        .unwrap_or(date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitlistStatus {
    Waiting,
    Notified,
    Converted,
}

impl WaitlistStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Notified => "notified",
            WaitlistStatus::Converted => "converted",
        }
    }
}

impl FromStr for WaitlistStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Ok(WaitlistStatus::Waiting),
            "notified" => Ok(WaitlistStatus::Notified),
            "converted" => Ok(WaitlistStatus::Converted),
            _ => Err(ParseEnumError::new("waitlist status", s)),
        }
    }
}

/// A prospective buyer waiting for stop-sale to lift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    pub email: String,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub tier: Option<CertificateTier>,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
}
