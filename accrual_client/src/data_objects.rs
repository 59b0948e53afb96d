use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The processing state of an order, as reported by the accrual system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// The order is known to the accrual system, but no calculation has started.
    Registered,
    /// The order will never earn points.
    Invalid,
    /// The accrual calculation is under way.
    Processing,
    /// The accrual calculation is complete.
    Processed,
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// The body of a `200 OK` response from `GET /api/orders/{number}`.
///
/// The accrual is a bare JSON number on the wire (`"accrual": 500.5`), and is only present for processed orders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
}
