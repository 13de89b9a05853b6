//! Supply matching for usage requests.
//!
//! Scores every active property that can host the party and returns the
//! best one, trying shifted weeks when the exact dates are taken.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{ConfirmedReservation, PropertyCategory, PropertyId, SupplyProperty};

const EXACT_BASE_SCORE: i64 = 100;
const FLEX_BASE_SCORE: i64 = 80;
const CITY_BONUS: i64 = 50;
const COUNTRY_BONUS: i64 = 25;
const CATEGORY_BONUS: i64 = 30;
const OCCUPANCY_FIT_BONUS: i64 = 20;
const FLEX_STEP_DAYS: i64 = 7;

pub const ALTERNATIVE_SCORE: i64 = 50;
pub const MAX_ALTERNATIVES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub desired_start_date: NaiveDate,
    pub desired_end_date: NaiveDate,
    #[serde(default)]
    pub flexibility_days: u32,
    pub party_size: u32,
    #[serde(default)]
    pub destination_preference: Option<String>,
    /// Category letter or `"any"`.
    #[serde(default)]
    pub category_preference: Option<String>,
}

impl MatchOptions {
    fn destination(&self) -> Option<String> {
        self.destination_preference
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_lowercase)
    }

    fn category(&self) -> Option<PropertyCategory> {
        self.category_preference
            .as_deref()
            .filter(|c| !c.eq_ignore_ascii_case("any"))
            .and_then(|c| c.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyMatch {
    pub property: SupplyProperty,
    pub score: i64,
    pub available_start: NaiveDate,
    pub available_end: NaiveDate,
}

fn is_free(
    property_id: PropertyId,
    start: NaiveDate,
    end: NaiveDate,
    reservations: &[ConfirmedReservation],
) -> bool {
    !reservations
        .iter()
        .any(|r| r.property_id == property_id && r.blocks(start, end))
}

fn destination_bonus(property: &SupplyProperty, destination: Option<&str>) -> i64 {
    match destination {
        Some(d) if property.city.to_lowercase().contains(d) => CITY_BONUS,
        Some(d) if property.country.to_lowercase().contains(d) => COUNTRY_BONUS,
        _ => 0,
    }
}

fn candidates<'a>(
    properties: &'a [SupplyProperty],
    party_size: u32,
) -> impl Iterator<Item = &'a SupplyProperty> {
    properties
        .iter()
        .filter(move |p| p.is_active() && p.max_occupancy >= party_size)
}

/// Best match for the request, or `None` when nothing is free.
///
/// Destination and category preferences narrow the candidate set; if that
/// leaves nothing, every candidate is considered. Ties keep input order.
pub fn find_best_match(
    options: &MatchOptions,
    properties: &[SupplyProperty],
    reservations: &[ConfirmedReservation],
) -> Option<PropertyMatch> {
    let all: Vec<&SupplyProperty> = candidates(properties, options.party_size).collect();
    if all.is_empty() {
        log::info!("matcher: no active property fits party of {}", options.party_size);
        return None;
    }

    let destination = options.destination();
    let category = options.category();

    let mut filtered: Vec<&SupplyProperty> = all
        .iter()
        .copied()
        .filter(|p| {
            destination.as_deref().map_or(true, |d| {
                p.country.to_lowercase().contains(d) || p.city.to_lowercase().contains(d)
            })
        })
        .filter(|p| category.map_or(true, |c| p.category == c))
        .collect();
    if filtered.is_empty() {
        filtered = all;
    }

    let start = options.desired_start_date;
    let end = options.desired_end_date;
    let flex = i64::from(options.flexibility_days);
    let mut best: Option<PropertyMatch> = None;

    for property in filtered {
        let found = if is_free(property.id, start, end, reservations) {
            let mut score = EXACT_BASE_SCORE + destination_bonus(property, destination.as_deref());
            if category == Some(property.category) {
                score += CATEGORY_BONUS;
            }
            let fit = i64::from(property.max_occupancy) - i64::from(options.party_size);
            if (0..=2).contains(&fit) {
                score += OCCUPANCY_FIT_BONUS;
            }
            Some((score, start, end))
        } else if flex > 0 {
            let mut offset = -flex;
            let mut shifted = None;
            while offset <= flex {
                let s = start + Duration::days(offset);
                let e = end + Duration::days(offset);
                if is_free(property.id, s, e, reservations) {
                    let score = FLEX_BASE_SCORE - offset.abs()
                        + destination_bonus(property, destination.as_deref());
                    shifted = Some((score, s, e));
                    break;
                }
                offset += FLEX_STEP_DAYS;
            }
            shifted
        } else {
            None
        };

        if let Some((score, available_start, available_end)) = found {
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(PropertyMatch {
                    property: property.clone(),
                    score,
                    available_start,
                    available_end,
                });
            }
        }
    }

    best
}

/// Other properties free on the exact dates, scored flat.
pub fn find_alternatives(
    exclude: PropertyId,
    options: &MatchOptions,
    properties: &[SupplyProperty],
    reservations: &[ConfirmedReservation],
) -> Vec<PropertyMatch> {
    candidates(properties, options.party_size)
        .filter(|p| p.id != exclude)
        .filter(|p| {
            is_free(
                p.id,
                options.desired_start_date,
                options.desired_end_date,
                reservations,
            )
        })
        .take(MAX_ALTERNATIVES)
        .map(|p| PropertyMatch {
            property: p.clone(),
            score: ALTERNATIVE_SCORE,
            available_start: options.desired_start_date,
            available_end: options.desired_end_date,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CertificateId, ConfirmedReservationStatus, PropertyStatus, ReservationId, UserId,
    };
    use chrono::Utc;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn property(city: &str, country: &str, category: PropertyCategory, occ: u32) -> SupplyProperty {
        SupplyProperty {
            id: PropertyId::generate(),
            name: format!("Villa {}", city),
            country: country.into(),
            city: city.into(),
            category,
            max_occupancy: occ,
            bedrooms: 2,
            bathrooms: 1.5,
            supply_weeks_per_year: Some(48),
            blackout_weeks: 0,
            status: PropertyStatus::Active,
            amenities: vec![],
            seasonal_pricing: vec![],
        }
    }

    fn booked(property: &SupplyProperty, start: NaiveDate, end: NaiveDate) -> ConfirmedReservation {
        ConfirmedReservation {
            id: ReservationId::generate(),
            request_id: None,
            user_id: UserId::generate(),
            certificate_id: CertificateId::generate(),
            property_id: property.id,
            check_in: start,
            check_out: end,
            party_size: 2,
            status: ConfirmedReservationStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    fn options(flex: u32) -> MatchOptions {
        MatchOptions {
            desired_start_date: d(7, 4),
            desired_end_date: d(7, 11),
            flexibility_days: flex,
            party_size: 4,
            destination_preference: None,
            category_preference: None,
        }
    }

    #[test]
    fn test_exact_match_scoring() {
        let tulum = property("Tulum", "México", PropertyCategory::A, 5);
        let mut opts = options(0);
        opts.destination_preference = Some("tulum".into());
        opts.category_preference = Some("A".into());

        let best = find_best_match(&opts, &[tulum.clone()], &[]).unwrap();
        assert_eq!(best.score, 100 + 50 + 30 + 20);
        assert_eq!(best.property.id, tulum.id);
        assert_eq!(best.available_start, d(7, 4));
    }

    #[test]
    fn test_country_bonus_and_no_fit_bonus() {
        let big = property("Cancún", "México", PropertyCategory::B, 10);
        let mut opts = options(0);
        opts.destination_preference = Some("méxico".into());
        let best = find_best_match(&opts, &[big], &[]).unwrap();
        assert_eq!(best.score, 125);
    }

    #[test]
    fn test_filter_falls_back_to_all_candidates() {
        let madrid = property("Madrid", "España", PropertyCategory::C, 4);
        let mut opts = options(0);
        opts.destination_preference = Some("Bali".into());
        let best = find_best_match(&opts, &[madrid.clone()], &[]).unwrap();
        assert_eq!(best.property.id, madrid.id);
        assert_eq!(best.score, 120);
    }

    #[test]
    fn test_flexible_dates_shift_by_weeks() {
        let villa = property("Tulum", "México", PropertyCategory::A, 4);
        let reservations = vec![booked(&villa, d(7, 1), d(7, 12))];

        assert!(find_best_match(&options(0), &[villa.clone()], &reservations).is_none());

        let best = find_best_match(&options(14), &[villa.clone()], &reservations).unwrap();
        // -14 overlaps nothing: Jun 20..Jun 27
        assert_eq!(best.available_start, d(6, 20));
        assert_eq!(best.score, 80 - 14);
    }

    #[test]
    fn test_cancelled_reservations_do_not_block() {
        let villa = property("Tulum", "México", PropertyCategory::A, 4);
        let mut res = booked(&villa, d(7, 1), d(7, 12));
        res.status = ConfirmedReservationStatus::Cancelled;
        assert!(find_best_match(&options(0), &[villa], &[res]).is_some());
    }

    #[test]
    fn test_small_properties_excluded() {
        let tiny = property("Tulum", "México", PropertyCategory::A, 2);
        assert!(find_best_match(&options(0), &[tiny], &[]).is_none());
    }

    #[test]
    fn test_alternatives_exclude_and_cap() {
        let props: Vec<SupplyProperty> = (0..8)
            .map(|i| property(&format!("City{}", i), "México", PropertyCategory::B, 6))
            .collect();
        let reservations = vec![booked(&props[1], d(7, 4), d(7, 11))];
        let alts = find_alternatives(props[0].id, &options(0), &props, &reservations);
        assert_eq!(alts.len(), MAX_ALTERNATIVES);
        assert!(alts.iter().all(|a| a.property.id != props[0].id));
        assert!(alts.iter().all(|a| a.property.id != props[1].id));
        assert!(alts.iter().all(|a| a.score == ALTERNATIVE_SCORE));
    }
}
