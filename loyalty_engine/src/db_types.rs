use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use lpg_common::Points;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------       UserId        ---------------------------------------------------------
/// The identifier of the user that owns orders and a balance. This is the login name issued at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// The externally visible order number. Checksum validation happens at intake, so any value that reaches the ledger
/// is assumed to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been uploaded, but the accrual system has not been asked about it yet, or does not know about it.
    New,
    /// The accrual system knows about the order, but has not reached a verdict.
    Processing,
    /// The accrual system has rejected the order. No points will be awarded.
    Invalid,
    /// The accrual system has awarded points for the order.
    Processed,
}

impl OrderStatusType {
    /// Terminal orders are never sent to the accrual system again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "NEW"),
            OrderStatusType::Processing => write!(f, "PROCESSING"),
            OrderStatusType::Invalid => write!(f, "INVALID"),
            OrderStatusType::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Order {
    pub id: i64,
    pub number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatusType,
    /// Only meaningful when the status is `Processed`.
    pub accrual: Points,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: UserId,
}

impl NewOrder {
    pub fn new<N: Into<OrderNumber>, U: Into<UserId>>(number: N, user_id: U) -> Self {
        Self { number: number.into(), user_id: user_id.into() }
    }
}

//--------------------------------------       Balance       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Balance {
    pub user_id: UserId,
    /// Points available to spend.
    pub current: Points,
    /// Lifetime total of points withdrawn.
    pub withdrawn: Points,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     Withdrawal      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    /// The order that the points were spent on.
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub amount: Points,
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------    VerdictStatus    ---------------------------------------------------------
/// The accrual system's view of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictStatus::Registered => write!(f, "REGISTERED"),
            VerdictStatus::Invalid => write!(f, "INVALID"),
            VerdictStatus::Processing => write!(f, "PROCESSING"),
            VerdictStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

//--------------------------------------       Verdict       ---------------------------------------------------------
/// The accrual system's answer for a single order. Verdicts are never stored; they are applied to the order and the
/// owner's balance as soon as they arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub number: OrderNumber,
    pub status: VerdictStatus,
    pub accrual: Points,
}

impl Verdict {
    pub fn new(number: OrderNumber, status: VerdictStatus, accrual: Points) -> Self {
        Self { number, status, accrual }
    }

    /// The ledger status that corresponds to this verdict. An order the accrual system has merely registered is
    /// still being processed as far as the ledger is concerned.
    pub fn order_status(&self) -> OrderStatusType {
        match self.status {
            VerdictStatus::Registered | VerdictStatus::Processing => OrderStatusType::Processing,
            VerdictStatus::Invalid => OrderStatusType::Invalid,
            VerdictStatus::Processed => OrderStatusType::Processed,
        }
    }

    /// The amount to credit to the owner's balance. Only processed orders earn points.
    pub fn credit(&self) -> Points {
        match self.status {
            VerdictStatus::Processed => self.accrual,
            _ => Points::zero(),
        }
    }

    /// Updates the in-memory copy of the order. The ledger remains authoritative until the change is committed.
    pub fn apply_to(&self, order: &mut Order) {
        order.status = self.order_status();
        order.accrual = self.credit();
    }
}
