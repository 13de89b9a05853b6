//! PAX product catalog, recommendations and purchase availability.

use serde::Serialize;

use crate::models::{
    CapacitySnapshot, CertificateProduct, CertificateTier, PaxCategory, ProductId, ProductSpec,
    SystemStatus,
};

/// Locked beta pricing (USD) and per-product caps, indexed by pax then stays.
const CATALOG: [(PaxCategory, [(u32, u32); 4]); 4] = [
    (
        PaxCategory::Two,
        [(3_500, 5), (6_000, 5), (8_000, 5), (10_000, 5)],
    ),
    (
        PaxCategory::Four,
        [(5_000, 7), (9_000, 7), (12_000, 6), (15_000, 6)],
    ),
    (
        PaxCategory::Six,
        [(7_500, 4), (13_000, 4), (18_000, 4), (20_000, 3)],
    ),
    (
        PaxCategory::Eight,
        [(10_000, 2), (15_000, 2), (20_000, 2), (25_000, 1)],
    ),
];

/// `(price_usd, beta_cap)` for a spec, `None` when stays fall outside 1..=4.
fn catalog_entry(spec: ProductSpec) -> Option<(u32, u32)> {
    let index = usize::from(spec.estancias.checked_sub(1)?);
    CATALOG
        .iter()
        .find(|(pax, _)| *pax == spec.max_pax)
        .and_then(|(_, row)| row.get(index).copied())
}

/// Catalog price in USD.
pub fn product_price(spec: ProductSpec) -> Option<u32> {
    catalog_entry(spec).map(|(price, _)| price)
}

/// Tier a PAX product counts as for capacity purposes.
pub fn tier_for_spec(spec: ProductSpec) -> CertificateTier {
    match spec.estancias {
        1 => CertificateTier::Silver,
        2 => CertificateTier::Gold,
        3 => CertificateTier::Platinum,
        _ => CertificateTier::Signature,
    }
}

/// The 16 catalog products, active and open for sale.
pub fn seed_catalog() -> Vec<CertificateProduct> {
    let mut products = Vec::with_capacity(16);
    for pax in PaxCategory::ALL {
        for estancias in ProductSpec::MIN_ESTANCIAS..=ProductSpec::MAX_ESTANCIAS {
            let spec = ProductSpec {
                max_pax: pax,
                estancias,
            };
            let Some((price_usd, beta_cap)) = catalog_entry(spec) else {
                continue;
            };
            let stays = if estancias == 1 {
                "1 estancia".to_string()
            } else {
                format!("{} estancias", estancias)
            };
            products.push(CertificateProduct {
                id: ProductId::generate(),
                spec,
                price_usd,
                display_name: format!("Certificado {} PAX · {}", pax.guests(), stays),
                description: format!(
                    "Hasta {} huéspedes y {} por año durante 15 años",
                    pax.guests(),
                    stays
                ),
                is_active: true,
                sales_enabled: true,
                beta_cap,
                sold_count: 0,
            });
        }
    }
    products
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub max_pax: u8,
    pub estancias: u8,
    pub price_usd: u32,
}

/// Smallest product covering the party, with stays clamped to 1..=4.
pub fn recommend_product(party_size: u32, desired_stays: i64) -> Recommendation {
    let max_pax = PaxCategory::for_party_size(party_size);
    let estancias = desired_stays.clamp(
        i64::from(ProductSpec::MIN_ESTANCIAS),
        i64::from(ProductSpec::MAX_ESTANCIAS),
    ) as u8;
    let spec = ProductSpec { max_pax, estancias };
    Recommendation {
        max_pax: max_pax.guests(),
        estancias,
        price_usd: product_price(spec).unwrap_or_default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAvailability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub remaining_for_product: i64,
    pub remaining_total: i64,
    pub waitlist_enabled: bool,
}

impl ProductAvailability {
    fn blocked(reason: &str, remaining_for_product: i64, waitlist_enabled: bool) -> Self {
        Self {
            available: false,
            reason: Some(reason.to_string()),
            remaining_for_product,
            remaining_total: 0,
            waitlist_enabled,
        }
    }

    pub fn not_found() -> Self {
        Self::blocked("Product not found", 0, false)
    }
}

/// Decide whether a product can be bought right now.
///
/// Checks run in order: product active, sales open, product cap, global
/// cap, then the latest capacity status. The first failing check wins.
pub fn evaluate_availability(
    product: &CertificateProduct,
    total_sold: i64,
    total_cap: u32,
    latest: Option<&CapacitySnapshot>,
) -> ProductAvailability {
    if !product.is_active {
        return ProductAvailability::blocked("Product is not active", 0, true);
    }
    if !product.sales_enabled {
        return ProductAvailability::blocked("Sales are currently stopped for this product", 0, true);
    }

    let remaining_for_product = product.remaining_for_product();
    if remaining_for_product <= 0 {
        return ProductAvailability::blocked("Product beta cap reached", 0, true);
    }

    let remaining_total = i64::from(total_cap) - total_sold;
    if remaining_total <= 0 {
        return ProductAvailability::blocked("Global beta cap reached", remaining_for_product, true);
    }

    if latest.map(|s| s.system_status) == Some(SystemStatus::Red) {
        return ProductAvailability {
            available: false,
            reason: Some("System capacity limit reached".to_string()),
            remaining_for_product,
            remaining_total,
            waitlist_enabled: true,
        };
    }

    ProductAvailability {
        available: true,
        reason: None,
        remaining_for_product,
        remaining_total,
        waitlist_enabled: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::capacity::{compute_snapshot, DEFAULT_BETA_TOTAL_CAP};

    fn spec(pax: PaxCategory, stays: u8) -> ProductSpec {
        ProductSpec::new(pax, stays).unwrap()
    }

    #[test]
    fn test_catalog_prices() {
        assert_eq!(product_price(spec(PaxCategory::Two, 1)), Some(3_500));
        assert_eq!(product_price(spec(PaxCategory::Four, 3)), Some(12_000));
        assert_eq!(product_price(spec(PaxCategory::Six, 4)), Some(20_000));
        assert_eq!(product_price(spec(PaxCategory::Eight, 4)), Some(25_000));
    }

    #[test]
    fn test_out_of_range_stays_have_no_catalog_entry() {
        let zero = ProductSpec {
            max_pax: PaxCategory::Four,
            estancias: 0,
        };
        let five = ProductSpec {
            max_pax: PaxCategory::Four,
            estancias: 5,
        };
        assert_eq!(product_price(zero), None);
        assert_eq!(product_price(five), None);
    }

    #[test]
    fn test_seed_catalog_caps_sum_to_beta_total() {
        let catalog = seed_catalog();
        assert_eq!(catalog.len(), 16);
        let caps: u32 = catalog.iter().map(|p| p.beta_cap).sum();
        assert_eq!(caps, DEFAULT_BETA_TOTAL_CAP);
    }

    #[test]
    fn test_recommend_product_buckets_and_clamps() {
        let rec = recommend_product(5, 9);
        assert_eq!(rec.max_pax, 6);
        assert_eq!(rec.estancias, 4);
        assert_eq!(rec.price_usd, 20_000);

        let rec = recommend_product(1, 0);
        assert_eq!((rec.max_pax, rec.estancias, rec.price_usd), (2, 1, 3_500));

        assert_eq!(recommend_product(12, 2).max_pax, 8);
    }

    #[test]
    fn test_availability_order() {
        let mut product = seed_catalog().remove(0);
        let open = evaluate_availability(&product, 0, 68, None);
        assert!(open.available);
        assert_eq!(open.remaining_for_product, 5);
        assert_eq!(open.remaining_total, 68);

        product.sold_count = 5;
        let capped = evaluate_availability(&product, 5, 68, None);
        assert_eq!(capped.reason.as_deref(), Some("Product beta cap reached"));
        assert!(capped.waitlist_enabled);

        product.sold_count = 1;
        let global = evaluate_availability(&product, 68, 68, None);
        assert_eq!(global.reason.as_deref(), Some("Global beta cap reached"));

        product.is_active = false;
        product.sales_enabled = false;
        let inactive = evaluate_availability(&product, 68, 68, None);
        assert_eq!(inactive.reason.as_deref(), Some("Product is not active"));
    }

    #[test]
    fn test_red_status_blocks_sales() {
        let product = seed_catalog().remove(0);
        let mut snap = compute_snapshot(&[], &[], 0);
        snap.system_status = SystemStatus::Red;
        let result = evaluate_availability(&product, 0, 68, Some(&snap));
        assert!(!result.available);
        assert_eq!(result.reason.as_deref(), Some("System capacity limit reached"));
    }
}
