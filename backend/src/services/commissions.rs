//! Broker levels, multi-level commissions and referral attribution.
//!
//! A sale pays the direct referrer at their level's rate and up to two
//! uplines at fixed override rates. Commissions start pending and are held
//! for 45 days before they can be approved.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{
    AttributionId, BrokerLevel, BrokerLevelTag, BrokerProfile, Commission, CommissionId,
    CommissionStatus, ReferralAttribution, ReferralEdge, ReservationId, UserId,
};

pub const DEFAULT_DIRECT_RATE: f64 = 0.04;
pub const LEVEL_2_RATE: f64 = 0.01;
pub const LEVEL_3_RATE: f64 = 0.005;
pub const MAX_REFERRAL_DEPTH: u8 = 3;
pub const COMMISSION_HOLD_DAYS: i64 = 45;
pub const ATTRIBUTION_WINDOW_DAYS: i64 = 30;

/// Level table ordered by ascending level number.
pub fn default_levels() -> Vec<BrokerLevel> {
    vec![
        BrokerLevel {
            tag: BrokerLevelTag::Broker,
            level_number: 1,
            display_name: "Broker".to_string(),
            direct_commission_rate: 0.04,
            min_weeks_sold: 0,
            min_active_affiliates: 0,
            retirement_bonus_rate: None,
        },
        BrokerLevel {
            tag: BrokerLevelTag::SilverBroker,
            level_number: 2,
            display_name: "Silver Broker".to_string(),
            direct_commission_rate: 0.05,
            min_weeks_sold: 24,
            min_active_affiliates: 5,
            retirement_bonus_rate: None,
        },
        BrokerLevel {
            tag: BrokerLevelTag::BrokerElite,
            level_number: 3,
            display_name: "Broker Elite".to_string(),
            direct_commission_rate: 0.06,
            min_weeks_sold: 52,
            min_active_affiliates: 10,
            retirement_bonus_rate: Some(0.01),
        },
    ]
}

pub fn level_for_tag(levels: &[BrokerLevel], tag: BrokerLevelTag) -> Option<&BrokerLevel> {
    levels.iter().find(|l| l.tag == tag)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BrokerStats {
    pub total_weeks_sold: u32,
    pub years_active: u32,
    pub num_affiliates: u32,
    pub total_commissions: f64,
}

/// Highest level whose weeks and affiliate thresholds are both met.
pub fn evaluate_level(levels: &[BrokerLevel], stats: &BrokerStats) -> BrokerLevelTag {
    levels
        .iter()
        .filter(|l| {
            stats.total_weeks_sold >= l.min_weeks_sold
                && stats.num_affiliates >= l.min_active_affiliates
        })
        .max_by_key(|l| l.level_number)
        .map(|l| l.tag)
        .unwrap_or(BrokerLevelTag::Broker)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelProgress {
    pub weeks_needed: u32,
    pub affiliates_needed: u32,
    pub weeks_progress: f64,
    pub affiliates_progress: f64,
}

fn progress_pct(current: u32, target: u32) -> f64 {
    if target == 0 {
        return 100.0;
    }
    (f64::from(current) / f64::from(target) * 100.0).min(100.0)
}

/// The level after `current`, if any.
pub fn next_level<'a>(levels: &'a [BrokerLevel], current: BrokerLevelTag) -> Option<&'a BrokerLevel> {
    let current_number = level_for_tag(levels, current).map_or(1, |l| l.level_number);
    levels
        .iter()
        .filter(|l| l.level_number > current_number)
        .min_by_key(|l| l.level_number)
}

pub fn progress_to(next: &BrokerLevel, stats: &BrokerStats) -> LevelProgress {
    LevelProgress {
        weeks_needed: next.min_weeks_sold.saturating_sub(stats.total_weeks_sold),
        affiliates_needed: next
            .min_active_affiliates
            .saturating_sub(stats.num_affiliates),
        weeks_progress: progress_pct(stats.total_weeks_sold, next.min_weeks_sold),
        affiliates_progress: progress_pct(stats.num_affiliates, next.min_active_affiliates),
    }
}

/// One commission line before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionLine {
    pub broker_id: UserId,
    pub level: u8,
    pub rate: f64,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_tag: Option<BrokerLevelTag>,
}

/// Split a sale across the buyer's referral chain.
///
/// `chain` holds the buyer's upline edges; only the three closest levels are
/// paid. `profile_of` resolves a level-1 broker's profile for its direct rate.
pub fn compute_commissions<'a, F>(
    sale_amount_usd: f64,
    chain: &[ReferralEdge],
    levels: &[BrokerLevel],
    profile_of: F,
) -> Vec<CommissionLine>
where
    F: Fn(UserId) -> Option<&'a BrokerProfile>,
{
    let mut edges: Vec<&ReferralEdge> = chain.iter().collect();
    edges.sort_by_key(|e| e.level);

    edges
        .into_iter()
        .take(usize::from(MAX_REFERRAL_DEPTH))
        .filter_map(|edge| {
            let (rate, level_tag) = match edge.level {
                1 => {
                    let tag = profile_of(edge.broker_id).map(|p| p.level_tag);
                    let rate = tag
                        .and_then(|t| level_for_tag(levels, t))
                        .map_or(DEFAULT_DIRECT_RATE, |l| l.direct_commission_rate);
                    (rate, tag)
                }
                2 => (LEVEL_2_RATE, None),
                3 => (LEVEL_3_RATE, None),
                _ => return None,
            };
            Some(CommissionLine {
                broker_id: edge.broker_id,
                level: edge.level,
                rate,
                amount: sale_amount_usd * rate,
                level_tag,
            })
        })
        .collect()
}

/// Persistable pending commission for a computed line.
pub fn pending_commission(
    line: &CommissionLine,
    sale_amount_usd: f64,
    reservation_id: Option<ReservationId>,
    now: DateTime<Utc>,
) -> Commission {
    Commission {
        id: CommissionId::generate(),
        broker_id: line.broker_id,
        reservation_id,
        sale_amount_usd,
        rate: line.rate,
        amount_usd: line.amount,
        referral_level: line.level,
        level_tag: line.level_tag,
        status: CommissionStatus::Pending,
        hold_until: now + Duration::days(COMMISSION_HOLD_DAYS),
        created_at: now,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetirementBonus {
    pub is_eligible: bool,
    pub rate: f64,
    pub amount: f64,
    pub reason: String,
}

pub fn retirement_bonus(
    levels: &[BrokerLevel],
    tag: BrokerLevelTag,
    sale_price_usd: f64,
) -> RetirementBonus {
    match level_for_tag(levels, tag).and_then(|l| l.retirement_bonus_rate) {
        Some(rate) => RetirementBonus {
            is_eligible: true,
            rate,
            amount: sale_price_usd * rate,
            reason: "Elegible para bono de retiro".to_string(),
        },
        None => RetirementBonus {
            is_eligible: false,
            rate: 0.0,
            amount: 0.0,
            reason: "El nivel actual no incluye bono de retiro".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionTotals {
    pub pending: f64,
    pub approved: f64,
    pub paid: f64,
    pub total: f64,
}

/// Sum commission amounts by status. Cancelled lines are left out of `total`.
pub fn totals(commissions: &[Commission]) -> CommissionTotals {
    let sum = |status: CommissionStatus| -> f64 {
        commissions
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.amount_usd)
            .sum()
    };
    let pending = sum(CommissionStatus::Pending);
    let approved = sum(CommissionStatus::Approved);
    let paid = sum(CommissionStatus::Paid);
    CommissionTotals {
        pending,
        approved,
        paid,
        total: pending + approved + paid,
    }
}

/// New attribution for an active broker, valid for the attribution window.
pub fn new_attribution(
    broker: &BrokerProfile,
    lead_email: Option<String>,
    lead_user_id: Option<UserId>,
    now: DateTime<Utc>,
) -> ReferralAttribution {
    ReferralAttribution {
        id: AttributionId::generate(),
        referral_code: broker.referral_code.clone(),
        broker_id: broker.user_id,
        lead_email: lead_email.map(|e| e.trim().to_lowercase()),
        lead_user_id,
        expires_at: now + Duration::days(ATTRIBUTION_WINDOW_DAYS),
        created_at: now,
    }
}

/// Newest unexpired attribution. A user id match takes precedence; the
/// email is only consulted when no user id is given.
pub fn pick_active_attribution<'a>(
    attributions: &'a [ReferralAttribution],
    user_id: Option<UserId>,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Option<&'a ReferralAttribution> {
    let email = email.map(|e| e.trim().to_lowercase());
    let matches = |a: &ReferralAttribution| match (user_id, email.as_deref()) {
        (Some(uid), _) => a.lead_user_id == Some(uid),
        (None, Some(e)) => a.lead_email.as_deref() == Some(e),
        (None, None) => false,
    };
    attributions
        .iter()
        .filter(|a| a.is_active(now) && matches(a))
        .max_by_key(|a| a.created_at)
}

/// Edges placing `buyer` under `broker` and the broker's own upline.
pub fn chain_for_new_referral(
    buyer: UserId,
    broker: UserId,
    broker_upline: &[ReferralEdge],
) -> Vec<ReferralEdge> {
    let mut edges = vec![ReferralEdge {
        broker_id: broker,
        referred_user_id: buyer,
        level: 1,
    }];
    edges.extend(
        broker_upline
            .iter()
            .filter(|e| e.level < MAX_REFERRAL_DEPTH)
            .map(|e| ReferralEdge {
                broker_id: e.broker_id,
                referred_user_id: buyer,
                level: e.level + 1,
            }),
    );
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(tag: BrokerLevelTag) -> BrokerProfile {
        BrokerProfile {
            user_id: UserId::generate(),
            referral_code: "WC-ANA01".into(),
            level_tag: tag,
            active: true,
            joined_at: Utc::now(),
            total_weeks_sold: 0,
        }
    }

    fn edge(broker: UserId, buyer: UserId, level: u8) -> ReferralEdge {
        ReferralEdge {
            broker_id: broker,
            referred_user_id: buyer,
            level,
        }
    }

    #[test]
    fn test_evaluate_level_requires_both_thresholds() {
        let levels = default_levels();
        let stats = |weeks, affiliates| BrokerStats {
            total_weeks_sold: weeks,
            num_affiliates: affiliates,
            ..Default::default()
        };
        assert_eq!(evaluate_level(&levels, &stats(0, 0)), BrokerLevelTag::Broker);
        assert_eq!(evaluate_level(&levels, &stats(30, 4)), BrokerLevelTag::Broker);
        assert_eq!(
            evaluate_level(&levels, &stats(30, 5)),
            BrokerLevelTag::SilverBroker
        );
        assert_eq!(
            evaluate_level(&levels, &stats(60, 12)),
            BrokerLevelTag::BrokerElite
        );
    }

    #[test]
    fn test_multi_level_rates() {
        let levels = default_levels();
        let buyer = UserId::generate();
        let silver = profile(BrokerLevelTag::SilverBroker);
        let up2 = UserId::generate();
        let up3 = UserId::generate();
        let up4 = UserId::generate();
        let chain = vec![
            edge(up3, buyer, 3),
            edge(silver.user_id, buyer, 1),
            edge(up4, buyer, 4),
            edge(up2, buyer, 2),
        ];
        let lines = compute_commissions(10_000.0, &chain, &levels, |id| {
            (id == silver.user_id).then_some(&silver)
        });
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].broker_id, silver.user_id);
        assert!((lines[0].amount - 500.0).abs() < 1e-9);
        assert_eq!(lines[0].level_tag, Some(BrokerLevelTag::SilverBroker));
        assert!((lines[1].amount - 100.0).abs() < 1e-9);
        assert!((lines[2].amount - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_direct_rate_defaults_without_profile() {
        let buyer = UserId::generate();
        let chain = vec![edge(UserId::generate(), buyer, 1)];
        let lines = compute_commissions(1_000.0, &chain, &default_levels(), |_| None);
        assert_eq!(lines[0].rate, DEFAULT_DIRECT_RATE);
        assert_eq!(lines[0].level_tag, None);
    }

    #[test]
    fn test_pending_commission_hold() {
        let now = Utc::now();
        let line = CommissionLine {
            broker_id: UserId::generate(),
            level: 1,
            rate: 0.04,
            amount: 40.0,
            level_tag: None,
        };
        let c = pending_commission(&line, 1_000.0, None, now);
        assert_eq!(c.status, CommissionStatus::Pending);
        assert_eq!(c.hold_until - now, Duration::days(45));
    }

    #[test]
    fn test_progress_caps_at_hundred() {
        let levels = default_levels();
        let next = next_level(&levels, BrokerLevelTag::Broker).unwrap();
        assert_eq!(next.tag, BrokerLevelTag::SilverBroker);
        let p = progress_to(
            next,
            &BrokerStats {
                total_weeks_sold: 48,
                num_affiliates: 2,
                ..Default::default()
            },
        );
        assert_eq!(p.weeks_needed, 0);
        assert_eq!(p.affiliates_needed, 3);
        assert_eq!(p.weeks_progress, 100.0);
        assert!((p.affiliates_progress - 40.0).abs() < 1e-9);
        assert!(next_level(&levels, BrokerLevelTag::BrokerElite).is_none());
    }

    #[test]
    fn test_retirement_bonus_only_for_elite() {
        let levels = default_levels();
        let elite = retirement_bonus(&levels, BrokerLevelTag::BrokerElite, 200_000.0);
        assert!(elite.is_eligible);
        assert!((elite.amount - 2_000.0).abs() < 1e-9);
        assert!(!retirement_bonus(&levels, BrokerLevelTag::SilverBroker, 200_000.0).is_eligible);
    }

    #[test]
    fn test_pick_active_attribution_prefers_newest() {
        let broker = profile(BrokerLevelTag::Broker);
        let now = Utc::now();
        let lead = UserId::generate();
        let older = new_attribution(&broker, None, Some(lead), now - Duration::days(10));
        let newer = new_attribution(&broker, None, Some(lead), now - Duration::days(1));
        let expired = new_attribution(&broker, None, Some(lead), now - Duration::days(31));
        let all = vec![older, newer.clone(), expired];
        let picked = pick_active_attribution(&all, Some(lead), None, now).unwrap();
        assert_eq!(picked.id, newer.id);
        assert!(pick_active_attribution(&all, None, None, now).is_none());
    }

    #[test]
    fn test_pick_attribution_by_email_is_case_insensitive() {
        let broker = profile(BrokerLevelTag::Broker);
        let now = Utc::now();
        let a = new_attribution(&broker, Some("Lead@Mail.com".into()), None, now);
        let all = vec![a];
        assert!(pick_active_attribution(&all, None, Some("lead@mail.com"), now).is_some());
    }

    #[test]
    fn test_chain_for_new_referral_shifts_upline() {
        let buyer = UserId::generate();
        let broker = UserId::generate();
        let b2 = UserId::generate();
        let b3 = UserId::generate();
        let upline = vec![edge(b2, broker, 1), edge(b3, broker, 2), edge(UserId::generate(), broker, 3)];
        let chain = chain_for_new_referral(buyer, broker, &upline);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].broker_id, broker);
        assert_eq!(chain[1], edge(b2, buyer, 2));
        assert_eq!(chain[2], edge(b3, buyer, 3));
    }
}
