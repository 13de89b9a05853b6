//! Checkout helpers: input formatting, tax breakdown, OXXO partial payments
//! and payment reference generation.
//!
//! No payment gateway is contacted; orders are created locally and carry a
//! reference the buyer can pay against.

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use super::error::{DomainError, DomainResult, FieldErrorsBuilder};
use super::validation;
use crate::models::{Currency, PaymentMethod};

/// Largest single OXXO payment, MXN.
pub const OXXO_LIMIT_MXN: f64 = 10_000.0;
pub const OXXO_MIN_MXN: f64 = 20.0;
/// Mexican VAT factor.
pub const IVA_FACTOR: f64 = 1.16;
/// Fixed MXN per USD used for display conversions.
pub const MXN_PER_USD: f64 = 17.5;
pub const SPEI_CLABE_PREFIX: &str = "646180";

fn card_digits_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4,16}").ok()).as_ref()
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Group the first 4-16 digits in blocks of four. Input with fewer than four
/// digits is returned unchanged.
pub fn format_card_number(value: &str) -> String {
    let v = digits(value);
    let found = card_digits_regex()
        .and_then(|re| re.find(&v))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    if found.is_empty() {
        return value.to_string();
    }
    found
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `MM/YY` once at least two digits are present.
pub fn format_expiry(value: &str) -> String {
    let v = digits(value);
    if v.len() >= 2 {
        let year_end = v.len().min(4);
        format!("{}/{}", &v[..2], &v[2..year_end])
    } else {
        v
    }
}

pub fn sanitize_cvc(value: &str) -> String {
    digits(value).chars().take(4).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxBreakdown {
    pub total_mxn: f64,
    pub subtotal_mxn: f64,
    pub iva_mxn: f64,
    pub total_usd: f64,
}

/// Split a VAT-inclusive MXN total. USD falls back to the fixed rate.
pub fn tax_breakdown(amount_mxn: f64, amount_usd: Option<f64>) -> TaxBreakdown {
    let subtotal = amount_mxn / IVA_FACTOR;
    TaxBreakdown {
        total_mxn: amount_mxn,
        subtotal_mxn: subtotal,
        iva_mxn: amount_mxn - subtotal,
        total_usd: amount_usd
            .filter(|usd| *usd > 0.0)
            .unwrap_or(amount_mxn / MXN_PER_USD),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialPayment {
    pub amount: f64,
    pub sequence: u32,
    pub total: u32,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn requires_partial_payments(amount_mxn: f64) -> bool {
    amount_mxn > OXXO_LIMIT_MXN
}

/// Split an OXXO amount into chunks no larger than the store limit.
pub fn oxxo_partial_payments(total_mxn: f64) -> DomainResult<Vec<PartialPayment>> {
    if !total_mxn.is_finite() || total_mxn < OXXO_MIN_MXN {
        return Err(DomainError::invalid(
            "amount",
            format!("Monto mínimo OXXO: ${} MXN", OXXO_MIN_MXN),
        ));
    }
    if !requires_partial_payments(total_mxn) {
        return Ok(vec![PartialPayment {
            amount: total_mxn,
            sequence: 1,
            total: 1,
        }]);
    }

    let mut amounts = Vec::new();
    let mut remaining = total_mxn;
    while remaining > 0.005 {
        let amount = remaining.min(OXXO_LIMIT_MXN);
        amounts.push(round_cents(amount));
        remaining -= amount;
    }
    let total = amounts.len() as u32;
    Ok(amounts
        .into_iter()
        .enumerate()
        .map(|(i, amount)| PartialPayment {
            amount,
            sequence: i as u32 + 1,
            total,
        })
        .collect())
}

/// Thousands-separated amount, two decimals only when there are cents.
fn format_mxn(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = cents / 100;
    let frac = cents % 100;
    let raw = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if frac == 0 {
        grouped
    } else {
        format!("{}.{:02}", grouped, frac)
    }
}

pub fn partial_payment_message(payments: &[PartialPayment]) -> String {
    if let [single] = payments {
        return format!("Pago único de ${} MXN", format_mxn(single.amount));
    }
    let breakdown = payments
        .iter()
        .map(|p| format!("Pago {}: ${} MXN", p.sequence, format_mxn(p.amount)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Se crearán {} pagos en OXXO:\n\n{}\n\nCada pago tendrá su propio código de barras y podrás pagarlos en cualquier orden.",
        payments.len(),
        breakdown
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentProgress {
    pub percentage: u32,
    pub remaining: u32,
    pub message: String,
}

pub fn payment_progress(completed: u32, total: u32) -> PaymentProgress {
    let completed = completed.min(total);
    let percentage = if total == 0 {
        100
    } else {
        (f64::from(completed) / f64::from(total) * 100.0).round() as u32
    };
    let remaining = total - completed;
    let message = if completed == 0 {
        format!("Pendiente: {} pagos por realizar", total)
    } else if completed < total {
        format!(
            "Progreso: {} de {} pagos completados ({} pendientes)",
            completed, total, remaining
        )
    } else {
        "Todos los pagos completados".to_string()
    };
    PaymentProgress {
        percentage,
        remaining,
        message,
    }
}

fn random_digits(count: usize) -> String {
    let mut out = String::with_capacity(count);
    while out.len() < count {
        for byte in Uuid::new_v4().as_bytes() {
            if out.len() == count {
                break;
            }
            out.push(char::from(b'0' + byte % 10));
        }
    }
    out
}

fn random_base36(count: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut value = Uuid::new_v4().as_u128();
    (0..count)
        .map(|_| {
            let ch = ALPHABET[(value % 36) as usize] as char;
            value /= 36;
            ch
        })
        .collect()
}

/// `OXXO` followed by ten digits.
pub fn oxxo_reference() -> String {
    format!("OXXO{}", random_digits(10))
}

/// 18-digit interbank account for SPEI transfers.
pub fn spei_clabe() -> String {
    format!("{}{}", SPEI_CLABE_PREFIX, random_digits(18 - SPEI_CLABE_PREFIX.len()))
}

pub fn card_order_id() -> String {
    format!("ord_{}", Uuid::new_v4().simple())
}

/// Shared id of the orders an OXXO purchase was split into.
pub fn payment_group_id() -> String {
    format!("grp_{}", Uuid::new_v4().simple())
}

/// Voucher code of the form `WC-2025-AB12-CD34`.
pub fn voucher_code(now: DateTime<Utc>) -> String {
    format!(
        "WC-{}-{}-{}",
        now.year(),
        random_base36(4),
        random_base36(4)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    pub amount_mxn: f64,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOrder {
    pub order_id: String,
    pub method: PaymentMethod,
    pub currency: Currency,
    pub reference: String,
    pub breakdown: TaxBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxxo_payments: Option<Vec<PartialPayment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validate the customer and build an order with the method's reference.
pub fn create_checkout_order(request: &CheckoutRequest) -> DomainResult<CheckoutOrder> {
    let mut errors = FieldErrorsBuilder::new();
    validation::check_full_name(&mut errors, "customer_name", &request.customer_name);
    validation::check_email(&mut errors, "customer_email", &request.customer_email);
    errors.check(
        request.amount_mxn.is_finite() && request.amount_mxn > 0.0,
        "amount_mxn",
        "El monto debe ser mayor a 0",
    );
    if request.method == PaymentMethod::Oxxo {
        let phone = request.customer_phone.as_deref().unwrap_or("");
        errors.check(
            validation::is_valid_phone(phone),
            "customer_phone",
            "Teléfono requerido para pagos en OXXO",
        );
    }
    errors.finish()?;

    let breakdown = tax_breakdown(request.amount_mxn, request.amount_usd);
    let (reference, oxxo_payments, instructions) = match request.method {
        PaymentMethod::Card => (card_order_id(), None, None),
        PaymentMethod::Oxxo => {
            let payments = oxxo_partial_payments(request.amount_mxn)?;
            let message = partial_payment_message(&payments);
            (oxxo_reference(), Some(payments), Some(message))
        }
        PaymentMethod::Spei => (
            spei_clabe(),
            None,
            Some("Realiza la transferencia SPEI a la CLABE indicada".to_string()),
        ),
    };

    log::info!(
        "checkout order created: method={} amount_mxn={:.2}",
        request.method,
        request.amount_mxn
    );

    Ok(CheckoutOrder {
        order_id: card_order_id(),
        method: request.method,
        currency: Currency::Mxn,
        reference,
        breakdown,
        oxxo_payments,
        instructions,
        created_at: Utc::now(),
    })
}
