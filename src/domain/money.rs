use crate::error::PaymentError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Minor units per major unit (kobo per naira).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// A running monetary total, such as a group's collected funds.
///
/// Wraps `rust_decimal::Decimal` so totals never go through floating point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// A strictly positive amount of money in major units.
///
/// Contributions, charges and verified payments are all expressed as `Amount`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts to the gateway's minor unit (e.g. naira to kobo).
    ///
    /// Fails if the amount carries sub-minor precision or does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PaymentError> {
        let minor = self
            .0
            .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
            .ok_or_else(|| PaymentError::ValidationError("Amount overflows".to_string()))?;
        if minor.fract() != Decimal::ZERO {
            return Err(PaymentError::ValidationError(format!(
                "Amount {} has more precision than the minor unit",
                self.0
            )));
        }
        minor
            .to_i64()
            .ok_or_else(|| PaymentError::ValidationError("Amount overflows".to_string()))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}
