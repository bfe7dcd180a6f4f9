//! Monetary amounts in the smallest currency unit.
//!
//! The storefront trades in a single currency (rupiah), so an amount is a
//! plain integer count of the smallest unit. Order totals and line snapshots
//! are sums and products of these integers - no floating point, no rounding.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// A monetary amount in the smallest currency unit.
///
/// Wraps an `i64` so that catalog prices, line snapshots, and order totals
/// share one arithmetic. Displays in the store's `Rp 30.000` convention
/// (dot-grouped thousands, no decimal places).
///
/// ## Examples
///
/// ```
/// use gilded_core::Money;
///
/// let price = Money::new(10_000);
/// let total = price.checked_mul(3).expect("no overflow");
/// assert_eq!(total, Money::new(30_000));
/// assert_eq!(total.to_string(), "Rp 30.000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a raw smallest-unit value.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the raw smallest-unit value.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let digits = self.0.unsigned_abs().to_string();

        // Group digits in threes from the right, separated by dots.
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        let offset = digits.len() % 3;
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (i + 3 - offset) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        if negative {
            write!(f, "-Rp {grouped}")
        } else {
            write!(f, "Rp {grouped}")
        }
    }
}

// SQLx support (with postgres feature): stored as BIGINT.
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
