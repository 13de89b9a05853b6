//! Payment methods, currencies and purchase vouchers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CertificateId, ParseEnumError, PaymentId, UserId, VoucherId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Oxxo,
    Spei,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Oxxo => "oxxo",
            PaymentMethod::Spei => "spei",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "oxxo" => Ok(PaymentMethod::Oxxo),
            "spei" => Ok(PaymentMethod::Spei),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Mxn,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(self) -> &'static str {
        match self {
            Currency::Mxn => "MXN",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MXN" => Ok(Currency::Mxn),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(ParseEnumError::new("currency", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    /// Issued for an offline payment that has not settled yet.
    Pending,
    Active,
    Used,
    Cancelled,
}

impl VoucherStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VoucherStatus::Pending => "pending",
            VoucherStatus::Active => "active",
            VoucherStatus::Used => "used",
            VoucherStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for VoucherStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(VoucherStatus::Pending),
            "active" => Ok(VoucherStatus::Active),
            "used" => Ok(VoucherStatus::Used),
            "cancelled" => Ok(VoucherStatus::Cancelled),
            _ => Err(ParseEnumError::new("voucher status", s)),
        }
    }
}

/// Proof of purchase handed to the buyer, looked up by `voucher_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateVoucher {
    pub id: VoucherId,
    pub voucher_code: String,
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub certificate_name: String,
    pub weeks_quantity: u32,
    pub validity_start_date: NaiveDate,
    pub validity_end_date: NaiveDate,
    pub holder_name: String,
    pub holder_email: String,
    pub wallet_address: Option<String>,
    pub payment_amount_cents: i64,
    pub payment_currency: Currency,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub payment_date: DateTime<Utc>,
    pub status: VoucherStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "expired" => Ok(PaymentStatus::Expired),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

/// One processor order backing a voucher. OXXO purchases above the store
/// limit are split into several records sharing a `payment_group_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: String,
    pub payment_group_id: Option<String>,
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub voucher_id: VoucherId,
    pub method: PaymentMethod,
    pub amount_mxn: f64,
    pub sequence: u32,
    pub total_parts: u32,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}
