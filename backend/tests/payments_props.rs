//! Property tests for the checkout helpers.

use proptest::prelude::*;

use weekchain::services::payments::{
    format_card_number, oxxo_partial_payments, payment_progress, tax_breakdown, OXXO_LIMIT_MXN,
};

proptest! {
    #[test]
    fn card_number_groups_keep_digits(digits in "[0-9]{4,24}") {
        let formatted = format_card_number(&digits);
        let groups: Vec<&str> = formatted.split(' ').collect();

        prop_assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= 4));
        let kept: String = groups.concat();
        prop_assert_eq!(kept.len(), digits.len().min(16));
        prop_assert!(digits.starts_with(&kept));
    }

    #[test]
    fn oxxo_installments_cover_total(cents in 2_000u64..5_000_000u64) {
        let total = cents as f64 / 100.0;
        let payments = oxxo_partial_payments(total).unwrap();

        let expected = if total > OXXO_LIMIT_MXN {
            (total / OXXO_LIMIT_MXN).ceil() as usize
        } else {
            1
        };
        prop_assert_eq!(payments.len(), expected);
        prop_assert!(payments.iter().all(|p| p.amount > 0.0 && p.amount <= OXXO_LIMIT_MXN));
        prop_assert!(payments
            .iter()
            .enumerate()
            .all(|(i, p)| p.sequence as usize == i + 1 && p.total as usize == payments.len()));

        let sum: f64 = payments.iter().map(|p| p.amount).sum();
        prop_assert!((sum - total).abs() < 0.01 * payments.len() as f64);
    }

    #[test]
    fn tax_breakdown_adds_up(amount in 1.0f64..1_000_000.0) {
        let breakdown = tax_breakdown(amount, None);
        prop_assert!((breakdown.subtotal_mxn + breakdown.iva_mxn - amount).abs() < 1e-6);
        prop_assert!(breakdown.iva_mxn > 0.0);
        prop_assert!(breakdown.total_usd > 0.0);
    }

    #[test]
    fn progress_is_bounded(completed in 0u32..20, total in 1u32..10) {
        let progress = payment_progress(completed, total);
        prop_assert!(progress.percentage <= 100);
        prop_assert_eq!(progress.remaining, total - completed.min(total));
        if completed >= total {
            prop_assert_eq!(progress.percentage, 100);
        }
    }
}

#[test]
fn test_below_minimum_is_rejected() {
    assert!(oxxo_partial_payments(19.99).is_err());
    assert!(oxxo_partial_payments(f64::NAN).is_err());
}
