//! Certificate lifecycle rules: yearly allowance reset, 15-year expiry and
//! reservation eligibility.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::certificate::add_years;
use crate::models::{CertificateStatus, UserCertificate};

/// Restore the yearly allowance once the certificate year has elapsed.
///
/// Returns `true` when the certificate was changed. The year start moves by
/// exactly one year so missed runs catch up one anniversary at a time.
pub fn annual_reset(cert: &mut UserCertificate, today: NaiveDate) -> bool {
    if cert.status != CertificateStatus::Active {
        return false;
    }
    if add_years(cert.year_start_date, 1) > today {
        return false;
    }
    cert.remaining_weeks_this_year = cert.weeks_per_year;
    cert.year_start_date = add_years(cert.year_start_date, 1);
    true
}

/// Mark an active certificate expired once its end date is reached.
pub fn expire(cert: &mut UserCertificate, today: NaiveDate) -> bool {
    if cert.status == CertificateStatus::Active && cert.end_date <= today {
        cert.status = CertificateStatus::Expired;
        return true;
    }
    false
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Eligibility {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn can_request_reservation(cert: &UserCertificate, today: NaiveDate) -> Eligibility {
    match cert.status {
        CertificateStatus::Expired => return Eligibility::denied("Certificate has expired"),
        CertificateStatus::Active => {}
        _ => return Eligibility::denied("Certificate is not active"),
    }
    if cert.end_date < today {
        return Eligibility::denied("Certificate validity period has ended");
    }
    if cert.remaining_weeks_this_year == 0 {
        return Eligibility::denied("No weeks remaining this year");
    }
    Eligibility::allowed()
}

/// Whether a stay starting on `start` can be requested today under the
/// tier's advance-booking window. Past dates are never requestable.
pub fn within_request_window(cert: &UserCertificate, start: NaiveDate, today: NaiveDate) -> bool {
    let days_ahead = (start - today).num_days();
    (0..=cert.tier.request_window_days()).contains(&days_ahead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CertificateTier, UserId};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cert(start: NaiveDate) -> UserCertificate {
        UserCertificate::issue(UserId::generate(), CertificateTier::Gold, None, start, 6_000.0)
    }

    #[test]
    fn test_annual_reset_after_anniversary() {
        let mut c = cert(d(2024, 5, 1));
        c.remaining_weeks_this_year = 0;
        assert!(!annual_reset(&mut c, d(2025, 4, 30)));
        assert!(annual_reset(&mut c, d(2025, 5, 1)));
        assert_eq!(c.remaining_weeks_this_year, 1);
        assert_eq!(c.year_start_date, d(2025, 5, 1));
        assert!(!annual_reset(&mut c, d(2025, 5, 2)));
    }

    #[test]
    fn test_annual_reset_skips_inactive() {
        let mut c = cert(d(2020, 1, 1));
        c.status = CertificateStatus::Paused;
        assert!(!annual_reset(&mut c, d(2025, 1, 1)));
    }

    #[test]
    fn test_expire_on_end_date() {
        let mut c = cert(d(2010, 3, 1));
        assert_eq!(c.end_date, d(2025, 3, 1));
        assert!(!expire(&mut c, d(2025, 2, 28)));
        assert!(expire(&mut c, d(2025, 3, 1)));
        assert_eq!(c.status, CertificateStatus::Expired);
        assert!(!expire(&mut c, d(2025, 3, 2)));
    }

    #[test]
    fn test_eligibility_reasons() {
        let today = d(2025, 6, 1);
        let mut c = cert(d(2025, 1, 1));
        assert!(can_request_reservation(&c, today).allowed);

        c.remaining_weeks_this_year = 0;
        assert_eq!(
            can_request_reservation(&c, today).reason.as_deref(),
            Some("No weeks remaining this year")
        );

        c.status = CertificateStatus::Cancelled;
        assert_eq!(
            can_request_reservation(&c, today).reason.as_deref(),
            Some("Certificate is not active")
        );

        c.status = CertificateStatus::Expired;
        assert_eq!(
            can_request_reservation(&c, today).reason.as_deref(),
            Some("Certificate has expired")
        );

        let mut old = cert(d(2005, 1, 1));
        old.status = CertificateStatus::Active;
        assert_eq!(
            can_request_reservation(&old, today).reason.as_deref(),
            Some("Certificate validity period has ended")
        );
    }

    #[test]
    fn test_request_window_by_tier() {
        let today = d(2025, 1, 1);
        let gold = cert(today);
        assert!(within_request_window(&gold, d(2025, 6, 30), today));
        assert!(!within_request_window(&gold, d(2025, 7, 1), today));
        assert!(!within_request_window(&gold, d(2024, 12, 31), today));
    }
}
