use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};

use crate::{
  config::Config,
  entity::{TargetType, commission_payout, commission_record, sales_rep},
  prelude::*,
  sv::{
    Ledger, LogNotifier, Notifier, OrderItem, PayoutEvent, Payouts, Rates,
    Reconciler, RepLookup, Reps, payout::Claims, split,
  },
};

/// `[first day of the month, first day of the next month)` around `day`.
pub fn month_bounds(day: NaiveDate) -> (DateTime, DateTime) {
  let start = day - Days::new(day.day0() as u64);
  let end = start + Months::new(1);
  (start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
}

/// Bounds of the calendar month before the one containing `today`.
pub fn previous_month(today: NaiveDate) -> (DateTime, DateTime) {
  let this_month = today - Days::new(today.day0() as u64);
  month_bounds(this_month - Days::new(1))
}

/// Entry points used by the order workflow and the payout schedule.
pub struct Engine<'a> {
  db: &'a DatabaseConnection,
  claims: &'a Claims,
  config: &'a Config,
  reps: Box<dyn RepLookup + 'a>,
  notifier: &'a dyn Notifier,
}

impl<'a> Engine<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    claims: &'a Claims,
    config: &'a Config,
  ) -> Self {
    Self {
      db,
      claims,
      config,
      reps: Box::new(Reps::new(db)),
      notifier: &LogNotifier,
    }
  }

  pub fn with_reps(mut self, reps: impl RepLookup + 'a) -> Self {
    self.reps = Box::new(reps);
    self
  }

  pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
    self.notifier = notifier;
    self
  }

  /// Resolves the rate, splits the commission and records it as pending.
  pub async fn on_order_item_approved(
    &self,
    item: &OrderItem,
    rep_id: i32,
  ) -> Result<Vec<commission_record::Model>> {
    let rep = self.reps.by_id(rep_id).await?.ok_or(Error::RepNotFound)?;
    if !rep.is_active {
      return Err(Error::RepInactive(rep_id));
    }

    let rep = self.with_live_parent(rep).await?;
    let rate = self.resolve_rate(item, &rep).await?;
    let split = split::compute(item.amount, rate, &rep, item.approved_at)?;

    Ledger::new(self.db).record_commission(item, &rep, &split).await
  }

  /// A parent that is gone or inactive gets no share.
  async fn with_live_parent(
    &self,
    rep: sales_rep::Model,
  ) -> Result<sales_rep::Model> {
    let Some(parent_id) = rep.parent_rep_id else {
      return Ok(rep);
    };

    match self.reps.by_id(parent_id).await? {
      Some(parent) if parent.is_active => Ok(rep),
      _ => {
        warn!(
          "Parent #{} of rep #{} is not active, rep keeps the full commission",
          parent_id, rep.id
        );
        Ok(sales_rep::Model { parent_rep_id: None, ..rep })
      }
    }
  }

  /// Product, then manufacturer, then category; the rep's own rate only
  /// when the fallback is enabled.
  async fn resolve_rate(
    &self,
    item: &OrderItem,
    rep: &sales_rep::Model,
  ) -> Result<Decimal> {
    let rates = Rates::new(self.db);
    let at = item.approved_at;

    let targets = [
      (TargetType::Product, Some(item.product_id)),
      (TargetType::Manufacturer, item.manufacturer_id),
      (TargetType::Category, item.category_id),
    ];

    for (target, id) in targets {
      let Some(id) = id else { continue };
      match rates.resolve(target, id, at).await {
        Ok(rate) => return Ok(rate),
        Err(Error::RateNotFound { .. }) => {
          trace!("No {target:?} rule for #{id} at {at}");
        }
        Err(err) => return Err(err),
      }
    }

    let fallback = rep.direct_rate();
    if self.config.rep_rate_fallback && fallback > Decimal::ZERO {
      debug!(
        "Order item #{}: using direct rate {}% of rep #{}",
        item.order_item_id, fallback, rep.id
      );
      return Ok(fallback);
    }

    Err(Error::RateNotFound {
      target: TargetType::Product,
      target_id: item.product_id,
      at,
    })
  }

  /// One payout per active rep with eligible records in `[start, end)`.
  ///
  /// Reps without records are skipped; a rep whose claim kept conflicting
  /// is logged and left for the next run.
  pub async fn run_monthly_batch(
    &self,
    start: DateTime,
    end: DateTime,
  ) -> Result<Vec<commission_payout::Model>> {
    let reps = Reps::new(self.db).active().await?;
    let payouts = Payouts::new(self.db, self.claims);

    let mut created = Vec::new();
    let mut skipped = 0;

    for rep in &reps {
      match payouts.batch_for_payout(rep.id, start, end).await {
        Ok(payout) => {
          self.notifier.notify(PayoutEvent::created(&payout)).await;
          created.push(payout);
        }
        Err(Error::EmptyBatch { .. }) => skipped += 1,
        Err(err) if err.is_recoverable() => {
          warn!("Payout for rep #{} postponed: {err}", rep.id);
        }
        Err(err) => return Err(err),
      }
    }

    info!(
      "Payout batch {start}..{end}: {} created, {} reps without records",
      created.len(),
      skipped
    );
    Ok(created)
  }

  pub async fn approve_payout(
    &self,
    payout_id: i32,
    approver_id: i64,
  ) -> Result<commission_payout::Model> {
    let payout = Reconciler::new(self.db).approve(payout_id, approver_id).await?;
    self
      .notifier
      .notify(PayoutEvent::Approved { payout_id, approver_id })
      .await;
    Ok(payout)
  }

  pub async fn process_payout(
    &self,
    payout_id: i32,
    reference: &str,
  ) -> Result<commission_payout::Model> {
    let payout =
      Reconciler::new(self.db).mark_processed(payout_id, reference).await?;
    self
      .notifier
      .notify(PayoutEvent::Processed {
        payout_id,
        payment_reference: payout.payment_reference.clone().unwrap_or_default(),
      })
      .await;
    Ok(payout)
  }
}
