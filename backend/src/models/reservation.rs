//! Usage requests and confirmed stays.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{
    CertificateId, ParseEnumError, PropertyCategory, PropertyId, RequestId, ReservationId, UserId,
};

/// Lifecycle of a WEEK-Booking usage request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationRequestStatus {
    Requested,
    Processing,
    Offered,
    Confirmed,
    Completed,
    Cancelled,
    Expired,
}

impl ReservationRequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationRequestStatus::Completed
                | ReservationRequestStatus::Cancelled
                | ReservationRequestStatus::Expired
        )
    }

    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: ReservationRequestStatus) -> bool {
        use ReservationRequestStatus::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Cancelled | Expired => true,
            Processing => self == Requested,
            Offered => self == Processing,
            Confirmed => self == Offered,
            Completed => self == Confirmed,
            Requested => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationRequestStatus::Requested => "requested",
            ReservationRequestStatus::Processing => "processing",
            ReservationRequestStatus::Offered => "offered",
            ReservationRequestStatus::Confirmed => "confirmed",
            ReservationRequestStatus::Completed => "completed",
            ReservationRequestStatus::Cancelled => "cancelled",
            ReservationRequestStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationRequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requested" => Ok(ReservationRequestStatus::Requested),
            "processing" => Ok(ReservationRequestStatus::Processing),
            "offered" => Ok(ReservationRequestStatus::Offered),
            "confirmed" => Ok(ReservationRequestStatus::Confirmed),
            "completed" => Ok(ReservationRequestStatus::Completed),
            "cancelled" => Ok(ReservationRequestStatus::Cancelled),
            "expired" => Ok(ReservationRequestStatus::Expired),
            _ => Err(ParseEnumError::new("reservation request status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub desired_start_date: NaiveDate,
    pub desired_end_date: NaiveDate,
    pub flexibility_days: u32,
    pub party_size: u32,
    pub destination_preference: Option<String>,
    pub category_preference: Option<PropertyCategory>,
    pub special_requests: Option<String>,
    pub status: ReservationRequestStatus,
    pub matched_property_id: Option<PropertyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmedReservationStatus {
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
    Relocated,
}

impl ConfirmedReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmedReservationStatus::Confirmed => "confirmed",
            ConfirmedReservationStatus::CheckedIn => "checked_in",
            ConfirmedReservationStatus::Completed => "completed",
            ConfirmedReservationStatus::Cancelled => "cancelled",
            ConfirmedReservationStatus::NoShow => "no_show",
            ConfirmedReservationStatus::Relocated => "relocated",
        }
    }
}

impl FromStr for ConfirmedReservationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(ConfirmedReservationStatus::Confirmed),
            "checked_in" => Ok(ConfirmedReservationStatus::CheckedIn),
            "completed" => Ok(ConfirmedReservationStatus::Completed),
            "cancelled" => Ok(ConfirmedReservationStatus::Cancelled),
            "no_show" => Ok(ConfirmedReservationStatus::NoShow),
            "relocated" => Ok(ConfirmedReservationStatus::Relocated),
            _ => Err(ParseEnumError::new("reservation status", s)),
        }
    }
}

/// A booked stay occupying a property for `[check_in, check_out)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedReservation {
    pub id: ReservationId,
    pub request_id: Option<RequestId>,
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub property_id: PropertyId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub party_size: u32,
    pub status: ConfirmedReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl ConfirmedReservation {
    /// Half-open overlap test against `[start, end)`. Cancelled stays never block.
    pub fn blocks(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.status != ConfirmedReservationStatus::Cancelled
            && start < self.check_out
            && end > self.check_in
    }
}
