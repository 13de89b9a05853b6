//! Public certificate verification view.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{CertificateVoucher, Season, UserCertificate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    pub label: &'static str,
    pub color: &'static str,
    pub valid: bool,
}

pub fn status_info(status: &str) -> StatusInfo {
    let (label, color, valid) = match status.trim().to_lowercase().as_str() {
        "confirmed" | "sold" => ("Certificado Válido", "green", true),
        "active" => ("Certificado Activo", "green", true),
        "available" => ("Disponible", "blue", true),
        "pending" => ("Pendiente de Confirmación", "yellow", false),
        "paused" => ("Pago Pendiente", "yellow", false),
        "cancelled" => ("Certificado Cancelado", "red", false),
        "expired" => ("Certificado Expirado", "gray", false),
        _ => ("Estado Desconocido", "gray", false),
    };
    StatusInfo {
        label,
        color,
        valid,
    }
}

pub fn season_name(season: &str) -> &'static str {
    match season.trim().to_lowercase().as_str() {
        "ultra-high" | "ultra_alta" => "Temporada Ultra Alta",
        "alta" | "high" => "Temporada Alta",
        "media" | "medium" | "mid" => "Temporada Media",
        "baja" | "low" => "Temporada Baja",
        _ => "Temporada Estándar",
    }
}

/// `0x1234...abcd`. Short values are shown as-is, empty ones as `N/A`.
pub fn mask_wallet(wallet: Option<&str>) -> String {
    match wallet.map(str::trim) {
        None | Some("") => "N/A".to_string(),
        Some(w) if w.chars().count() < 10 => w.to_string(),
        Some(w) => {
            let chars: Vec<char> = w.chars().collect();
            let head: String = chars[..6].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationView {
    pub certificate_id: String,
    pub status: String,
    pub status_info: StatusInfo,
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub weeks_per_year: u32,
    pub season: &'static str,
    pub holder_wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// `season` is the season of the certificate's latest stay; `None` shows
/// the standard season.
pub fn build_view(
    cert: &UserCertificate,
    voucher: Option<&CertificateVoucher>,
    wallet: Option<&str>,
    season: Option<Season>,
) -> VerificationView {
    let status = cert.status.as_str().to_string();
    VerificationView {
        certificate_id: cert.id.to_string(),
        status_info: status_info(&status),
        status,
        tier: cert.tier.to_string(),
        product: cert.product_spec.map(|s| s.key()),
        valid_from: cert.start_date,
        valid_until: cert.end_date,
        weeks_per_year: cert.weeks_per_year,
        season: season_name(season.map_or("standard", Season::as_str)),
        holder_wallet: mask_wallet(
            wallet.or_else(|| voucher.and_then(|v| v.wallet_address.as_deref())),
        ),
        voucher_code: voucher.map(|v| v.voucher_code.clone()),
        payment_reference: voucher.map(|v| v.payment_reference.clone()),
        issued_at: cert.created_at,
    }
}
