use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::newtype_ops;

pub const DEFAULT_CURRENCY_CODE: &str = "BRL";

//--------------------------------------       Cents         ---------------------------------------------------------
/// A monetary amount in the minor unit of the order currency. The gateway speaks in cents too, so no conversion is
/// needed on the way in or out.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

newtype_ops!(Cents; binary Add::add, Sub::sub; assign AddAssign::add_assign, SubAssign::sub_assign; unary Neg::neg);

#[derive(Debug, Clone, Error)]
#[error("Amount overflow: {0}")]
pub struct CentsOverflowError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The price of `quantity` units, failing instead of wrapping.
    pub fn checked_mul(self, quantity: i64) -> Result<Self, CentsOverflowError> {
        self.0
            .checked_mul(quantity)
            .map(Self)
            .ok_or_else(|| CentsOverflowError(format!("{self} x {quantity}")))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, CentsOverflowError> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| CentsOverflowError(format!("{self} + {rhs}")))
    }

    /// Sums the amounts, failing on the first overflow.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self, CentsOverflowError> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }
}
