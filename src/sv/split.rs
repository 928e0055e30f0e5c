use serde::Serialize;

use crate::{
  entity::{RecordKind, sales_rep},
  money,
  prelude::*,
};

/// Commission of one order item divided between a rep and its parent.
///
/// `direct + parent == total` holds exactly; `total` is already rounded to
/// cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Split {
  pub rep_id: i32,
  pub parent_rep_id: Option<i32>,
  pub rate: Decimal,
  pub total: Decimal,
  pub direct: Decimal,
  pub parent: Decimal,
  pub calculated_at: DateTime,
}

impl Split {
  /// Kind of the record carrying the rep's own share.
  pub fn direct_kind(&self) -> RecordKind {
    match self.parent_rep_id {
      Some(_) => RecordKind::SubRepShare,
      None => RecordKind::DirectRep,
    }
  }
}

/// Splits `amount * base_rate%` between `rep` and its parent.
///
/// Shares are rounded half-even to cents; the parent's share is rounded on
/// its own and the direct share takes the remainder, so the residual cent
/// always lands on the direct rep.
pub fn compute(
  amount: Decimal,
  base_rate: Decimal,
  rep: &sales_rep::Model,
  at: DateTime,
) -> Result<Split> {
  if amount < Decimal::ZERO {
    return Err(Error::NegativeAmount(format!("order item amount {amount}")));
  }
  let rate = money::percent(base_rate, "commission rate")?;

  let exact = share_of(amount, rate)?;
  let total = money::round(exact);

  let parent = match rep.parent_rep_id {
    Some(_) => {
      let share = money::percent(rep.parent_share(), "parent share")?;
      money::round(share_of(exact, share)?)
    }
    None => Decimal::ZERO,
  };

  Ok(Split {
    rep_id: rep.id,
    parent_rep_id: rep.parent_rep_id,
    rate,
    total,
    direct: total - parent,
    parent,
    calculated_at: at,
  })
}

/// `value * percent / 100`, refusing amounts beyond `Decimal` range.
fn share_of(value: Decimal, percent: Decimal) -> Result<Decimal> {
  value
    .checked_mul(percent)
    .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
    .ok_or_else(|| {
      Error::InvalidArgs(format!("{percent}% of {value} is out of range"))
    })
}
