use std::{fmt::Display, iter::Sum, ops::Add};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of hundredths in one loyalty point.
const SCALE: i64 = 100;

//--------------------------------------       Points        ---------------------------------------------------------
/// A loyalty-points amount, stored as a whole number of hundredths of a point.
///
/// Ledger amounts are never negative, but intermediate arithmetic (e.g. computing a debit) may produce negative values,
/// so the inner type is signed. The non-negative invariant is enforced by the storage layer.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Points(i64);

op!(binary Points, Add, add);
op!(binary Points, Sub, sub);
op!(inplace Points, AddAssign, add_assign);
op!(inplace Points, SubAssign, sub_assign);
op!(unary Points, Neg, neg);

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PointsConversionError {
    #[error("Points cannot be negative: {0}")]
    Negative(Decimal),
    #[error("Value is too large to be represented as points: {0}")]
    Overflow(Decimal),
}

impl From<i64> for Points {
    fn from(hundredths: i64) -> Self {
        Self(hundredths)
    }
}

impl TryFrom<Decimal> for Points {
    type Error = PointsConversionError;

    /// Converts a decimal amount into points, rounding half away from zero to two decimal places.
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PointsConversionError::Negative(value));
        }
        let hundredths = value
            .checked_mul(Decimal::from(SCALE))
            .ok_or(PointsConversionError::Overflow(value))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        hundredths.to_i64().map(Self).ok_or(PointsConversionError::Overflow(value))
    }
}

impl From<Points> for Decimal {
    fn from(value: Points) -> Self {
        Decimal::new(value.0, 2)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

impl Points {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_whole(points: i64) -> Self {
        Self(points * SCALE)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
