//! Capacity engine.
//!
//! Compares projected certificate demand against the safe share of supply
//! weeks and derives a traffic-light status plus a stop-sale ladder. The
//! ladder closes the cheapest tiers first.

use chrono::Utc;
use serde::Serialize;

use crate::models::{
    CapacitySnapshot, CapacityStatusId, CertificateProduct, CertificateStatus, CertificateTier,
    SalesFlags, SupplyProperty, SystemStatus, TierCounts, UserCertificate,
};

/// Share of supply weeks that may be promised to certificate holders.
pub const SAFETY_FACTOR: f64 = 0.70;

pub const GREEN_MAX_PCT: f64 = 50.0;
pub const YELLOW_MAX_PCT: f64 = 65.0;

/// Stop-sale thresholds: Silver closes first, then Gold, then everything.
pub const STOP_SILVER_PCT: f64 = 65.0;
pub const STOP_GOLD_PCT: f64 = 75.0;
pub const STOP_ALL_PCT: f64 = 85.0;

/// Certificates allowed during the beta program across all products.
pub const DEFAULT_BETA_TOTAL_CAP: u32 = 68;

pub fn safe_capacity(total_supply_weeks: u32) -> u32 {
    (f64::from(total_supply_weeks) * SAFETY_FACTOR).floor() as u32
}

/// Σ count × weeks per year × expected usage rate.
pub fn projected_demand(counts: &TierCounts) -> f64 {
    CertificateTier::ALL
        .iter()
        .map(|&tier| {
            f64::from(counts.get(tier))
                * f64::from(tier.weeks_per_year())
                * tier.expected_usage_rate()
        })
        .sum()
}

pub fn utilization_pct(demand: f64, safe_capacity: u32) -> f64 {
    if safe_capacity == 0 {
        return 0.0;
    }
    demand / f64::from(safe_capacity) * 100.0
}

pub fn system_status(utilization_pct: f64) -> SystemStatus {
    if utilization_pct < GREEN_MAX_PCT {
        SystemStatus::Green
    } else if utilization_pct < YELLOW_MAX_PCT {
        SystemStatus::Yellow
    } else {
        SystemStatus::Red
    }
}

/// Sales flags for the given utilization. The waitlist opens whenever any
/// tier is closed.
pub fn stop_sale(utilization_pct: f64) -> (SalesFlags, bool) {
    let flags = if utilization_pct < STOP_SILVER_PCT {
        SalesFlags::ALL_OPEN
    } else if utilization_pct < STOP_GOLD_PCT {
        SalesFlags {
            silver: false,
            ..SalesFlags::ALL_OPEN
        }
    } else if utilization_pct < STOP_ALL_PCT {
        SalesFlags {
            silver: false,
            gold: false,
            ..SalesFlags::ALL_OPEN
        }
    } else {
        SalesFlags {
            silver: false,
            gold: false,
            platinum: false,
            signature: false,
        }
    };
    (flags, flags.any_stopped())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build a fresh snapshot from the current supply and certificate tables.
///
/// Only active properties contribute supply weeks and only active
/// certificates contribute demand.
pub fn compute_snapshot(
    properties: &[SupplyProperty],
    certificates: &[UserCertificate],
    waitlist_count: u32,
) -> CapacitySnapshot {
    let active: Vec<&SupplyProperty> = properties.iter().filter(|p| p.is_active()).collect();
    let total_supply_weeks: u32 = active.iter().map(|p| p.effective_supply_weeks()).sum();
    let safe = safe_capacity(total_supply_weeks);

    let mut counts = TierCounts::default();
    for cert in certificates
        .iter()
        .filter(|c| c.status == CertificateStatus::Active)
    {
        counts.increment(cert.tier);
    }

    let demand = projected_demand(&counts);
    let utilization = utilization_pct(demand, safe);
    let (sales_enabled, waitlist_active) = stop_sale(utilization);

    log::debug!(
        "capacity: supply={} safe={} demand={:.2} utilization={:.2}%",
        total_supply_weeks,
        safe,
        demand,
        utilization
    );

    CapacitySnapshot {
        id: CapacityStatusId::generate(),
        total_properties: properties.len() as u32,
        active_properties: active.len() as u32,
        total_supply_weeks,
        safe_capacity: safe,
        active_certificates: counts,
        projected_demand: demand,
        utilization_pct: round2(utilization),
        system_status: system_status(utilization),
        sales_enabled,
        waitlist_active,
        waitlist_count,
        calculated_at: Utc::now(),
    }
}

/// Whether the tier may be sold under the latest snapshot. No snapshot means open.
pub fn is_tier_available(latest: Option<&CapacitySnapshot>, tier: CertificateTier) -> bool {
    latest.map_or(true, |snap| snap.sales_enabled.is_enabled(tier))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BetaCapCheck {
    pub available: bool,
    pub remaining_for_product: i64,
    pub remaining_total: i64,
}

/// Beta cap headroom for one product given the whole catalog.
///
/// An unknown product is never available.
pub fn check_beta_cap(
    product: Option<&CertificateProduct>,
    catalog: &[CertificateProduct],
    total_cap: u32,
) -> BetaCapCheck {
    let remaining_total = i64::from(total_cap) - total_sold(catalog);
    match product {
        None => BetaCapCheck {
            available: false,
            remaining_for_product: 0,
            remaining_total,
        },
        Some(product) => {
            let remaining_for_product = product.remaining_for_product();
            BetaCapCheck {
                available: remaining_for_product > 0 && remaining_total > 0,
                remaining_for_product,
                remaining_total,
            }
        }
    }
}

pub fn total_sold(catalog: &[CertificateProduct]) -> i64 {
    catalog.iter().map(|p| i64::from(p.sold_count)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyCategory, PropertyId, PropertyStatus, UserId};
    use chrono::NaiveDate;

    fn property(weeks: Option<u32>, status: PropertyStatus) -> SupplyProperty {
        SupplyProperty {
            id: PropertyId::generate(),
            name: "Casa".into(),
            country: "México".into(),
            city: "Tulum".into(),
            category: PropertyCategory::A,
            max_occupancy: 4,
            bedrooms: 2,
            bathrooms: 2.0,
            supply_weeks_per_year: weeks,
            blackout_weeks: 0,
            status,
            amenities: vec![],
            seasonal_pricing: vec![],
        }
    }

    fn cert(tier: CertificateTier) -> UserCertificate {
        UserCertificate::issue(
            UserId::generate(),
            tier,
            None,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            f64::from(tier.price_usd()),
        )
    }

    #[test]
    fn test_safe_capacity_floors() {
        assert_eq!(safe_capacity(100), 70);
        assert_eq!(safe_capacity(48), 33);
        assert_eq!(safe_capacity(0), 0);
    }

    #[test]
    fn test_projected_demand_weights_tiers() {
        let counts = TierCounts {
            silver: 10,
            gold: 0,
            platinum: 5,
            signature: 1,
        };
        // 10*1*0.55 + 5*2*0.80 + 1*4*0.85
        let expected = 5.5 + 8.0 + 3.4;
        assert!((projected_demand(&counts) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(system_status(0.0), SystemStatus::Green);
        assert_eq!(system_status(49.99), SystemStatus::Green);
        assert_eq!(system_status(50.0), SystemStatus::Yellow);
        assert_eq!(system_status(64.99), SystemStatus::Yellow);
        assert_eq!(system_status(65.0), SystemStatus::Red);
    }

    #[test]
    fn test_stop_sale_ladder() {
        let (flags, waitlist) = stop_sale(64.0);
        assert_eq!(flags, SalesFlags::ALL_OPEN);
        assert!(!waitlist);

        let (flags, waitlist) = stop_sale(70.0);
        assert!(!flags.silver && flags.gold && flags.platinum && flags.signature);
        assert!(waitlist);

        let (flags, _) = stop_sale(80.0);
        assert!(!flags.silver && !flags.gold && flags.platinum && flags.signature);

        let (flags, waitlist) = stop_sale(85.0);
        assert!(!flags.platinum && !flags.signature);
        assert!(waitlist);
    }

    #[test]
    fn test_utilization_zero_capacity() {
        assert_eq!(utilization_pct(10.0, 0), 0.0);
    }

    #[test]
    fn test_compute_snapshot_ignores_inactive_rows() {
        let properties = vec![
            property(None, PropertyStatus::Active),
            property(Some(20), PropertyStatus::Active),
            property(Some(52), PropertyStatus::Offline),
        ];
        let mut expired = cert(CertificateTier::Signature);
        expired.status = CertificateStatus::Expired;
        let certificates = vec![cert(CertificateTier::Gold), expired];

        let snap = compute_snapshot(&properties, &certificates, 3);
        assert_eq!(snap.total_properties, 3);
        assert_eq!(snap.active_properties, 2);
        assert_eq!(snap.total_supply_weeks, 68);
        assert_eq!(snap.safe_capacity, 47);
        assert_eq!(snap.active_certificates.total(), 1);
        assert!((snap.projected_demand - 0.70).abs() < 1e-9);
        assert_eq!(snap.utilization_pct, 1.49);
        assert_eq!(snap.system_status, SystemStatus::Green);
        assert_eq!(snap.waitlist_count, 3);
    }

    #[test]
    fn test_tier_available_without_snapshot() {
        assert!(is_tier_available(None, CertificateTier::Silver));
    }
}
