//! Decimal money amounts.
//!
//! All prices and totals use [`rust_decimal::Decimal`]; floating point never
//! touches an amount. The store runs in a single currency, configured on the
//! storefront, so `Money` carries no currency code.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors produced when constructing or converting [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// A product price must be strictly positive.
    #[error("price must be greater than zero (got {0})")]
    NonPositivePrice(Decimal),
    /// The amount cannot be represented in minor units.
    #[error("amount {0} does not fit in minor currency units")]
    Overflow(Decimal),
}

/// A monetary amount in the store currency's standard unit (dollars, not cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap an arbitrary amount (totals, refunds).
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Validate a catalog price, which must be strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NonPositivePrice`] for zero or negative amounts.
    pub fn price(amount: Decimal) -> Result<Self, MoneyError> {
        if amount <= Decimal::ZERO {
            return Err(MoneyError::NonPositivePrice(amount));
        }
        Ok(Self(amount))
    }

    /// Underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount multiplied by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Amount in minor units (cents), rounded half away from zero.
    ///
    /// Payment gateways take integer minor units.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let cents = (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().ok_or(MoneyError::Overflow(self.0))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_must_be_positive() {
        assert!(Money::price(Decimal::new(1999, 2)).is_ok());
        assert_eq!(
            Money::price(Decimal::ZERO),
            Err(MoneyError::NonPositivePrice(Decimal::ZERO))
        );
        assert!(Money::price(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_times_and_sum() {
        let price = Money::price(Decimal::new(1050, 2)).unwrap();
        let total: Money = [price.times(2), price.times(1)].into_iter().sum();
        assert_eq!(total.amount(), Decimal::new(3150, 2));
    }

    #[test]
    fn test_minor_units_rounds() {
        assert_eq!(Money::new(Decimal::new(1999, 2)).to_minor_units(), Ok(1999));
        assert_eq!(Money::new(Decimal::new(10005, 3)).to_minor_units(), Ok(1001));
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Money::new(Decimal::new(5, 0)).to_string(), "5.00");
    }
}
