//! Decimal money helpers.
//!
//! Amounts are persisted as whole cents and rates as hundredths of a
//! percent; arithmetic happens on [`Decimal`] and is rounded half-even to
//! cents at the edges.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::prelude::*;

pub const CENT_PLACES: u32 = 2;

pub fn round(value: Decimal) -> Decimal {
  value.round_dp_with_strategy(CENT_PLACES, RoundingStrategy::MidpointNearestEven)
}

pub fn from_cents(cents: i64) -> Decimal {
  Decimal::new(cents, CENT_PLACES)
}

/// Rounds half-even to cents first.
pub fn to_cents(value: Decimal) -> Result<i64> {
  let mut cents = round(value);
  cents.rescale(CENT_PLACES);
  cents.mantissa().to_i64().ok_or_else(|| {
    Error::InvalidArgs(format!("amount {value} does not fit in cents"))
  })
}

pub fn from_bp(bp: i32) -> Decimal {
  Decimal::new(bp as i64, CENT_PLACES)
}

/// Percent with at most two decimals, e.g. `12.5` -> `1250`.
pub fn to_bp(percent: Decimal) -> Result<i32> {
  let mut scaled = percent;
  if scaled.scale() > CENT_PLACES {
    if scaled.normalize().scale() > CENT_PLACES {
      return Err(Error::InvalidArgs(format!(
        "rate {percent} has more than {CENT_PLACES} decimals"
      )));
    }
    scaled = scaled.normalize();
  }
  scaled.rescale(CENT_PLACES);
  scaled
    .mantissa()
    .to_i32()
    .ok_or_else(|| Error::InvalidArgs(format!("rate {percent} out of range")))
}

/// Validates a percentage in `[0, 100]`.
pub fn percent(value: Decimal, what: &str) -> Result<Decimal> {
  if value.is_sign_negative() && !value.is_zero() {
    return Err(Error::NegativeAmount(format!("{what} {value}")));
  }
  if value > Decimal::ONE_HUNDRED {
    return Err(Error::InvalidArgs(format!("{what} {value} exceeds 100%")));
  }
  Ok(value)
}
