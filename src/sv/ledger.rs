use sea_orm::{ActiveValue::NotSet, Condition, sea_query::Expr};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{RecordKind, RecordStatus, commission_record, sales_rep},
  money,
  prelude::*,
  sv::split::Split,
};

/// Approved order line as handed over by the order workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
  pub order_id: i64,
  pub order_item_id: i64,
  pub amount: Decimal,
  pub product_id: i64,
  pub manufacturer_id: Option<i64>,
  pub category_id: Option<i64>,
  pub approved_at: DateTime,
}

/// Commission records: one row per (order item, recipient).
pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTotal {
  pub amount: Decimal,
  pub count: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CommissionSummary {
  pub pending: StatusTotal,
  pub approved: StatusTotal,
  pub included: StatusTotal,
  pub paid: StatusTotal,
}

impl CommissionSummary {
  pub fn total(&self) -> Decimal {
    self.pending.amount
      + self.approved.amount
      + self.included.amount
      + self.paid.amount
  }
}

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Writes the rep's record and, when the parent gets something, the
  /// parent's record. Both rows or neither.
  pub async fn record_commission(
    &self,
    item: &OrderItem,
    rep: &sales_rep::Model,
    split: &Split,
  ) -> Result<Vec<commission_record::Model>> {
    if split.rep_id != rep.id {
      return Err(Error::InvalidArgs(format!(
        "split computed for rep #{}, recording for #{}",
        split.rep_id, rep.id
      )));
    }

    let rate_bp = money::to_bp(split.rate)?;
    let direct_cents = money::to_cents(split.direct)?;
    let parent_cents = money::to_cents(split.parent)?;

    let txn = self.db.begin().await?;

    let existing = commission_record::Entity::find()
      .filter(commission_record::Column::OrderItemId.eq(item.order_item_id))
      .filter(
        commission_record::Column::Kind
          .is_in([RecordKind::DirectRep, RecordKind::SubRepShare]),
      )
      .count(&txn)
      .await?;

    if existing > 0 {
      return Err(Error::AlreadyRecorded(item.order_item_id));
    }

    let now = Utc::now().naive_utc();
    let line = |rep_id: i32,
                parent_rep_id: Option<i32>,
                amount_cents: i64,
                kind: RecordKind| {
      commission_record::ActiveModel {
        id: NotSet,
        order_id: Set(item.order_id),
        order_item_id: Set(item.order_item_id),
        rep_id: Set(rep_id),
        parent_rep_id: Set(parent_rep_id),
        amount_cents: Set(amount_cents),
        rate_bp: Set(rate_bp),
        kind: Set(kind),
        status: Set(RecordStatus::Pending),
        calculation_date: Set(split.calculated_at),
        payout_id: Set(None),
        approved_by: Set(None),
        approved_at: Set(None),
        paid_at: Set(None),
        reverses_id: Set(None),
        notes: Set(None),
        created_at: Set(now),
      }
    };

    let mut records = vec![
      line(rep.id, split.parent_rep_id, direct_cents, split.direct_kind())
        .insert(&txn)
        .await?,
    ];

    if let Some(parent_id) = split.parent_rep_id
      && parent_cents > 0
    {
      records.push(
        line(parent_id, Some(rep.id), parent_cents, RecordKind::ParentRepShare)
          .insert(&txn)
          .await?,
      );
    }

    txn.commit().await?;

    debug!(
      "Order item #{}: {} to rep #{}, {} to parent {:?}",
      item.order_item_id, split.direct, rep.id, split.parent, split.parent_rep_id
    );
    Ok(records)
  }

  pub async fn get(&self, record_id: i32) -> Result<commission_record::Model> {
    commission_record::Entity::find_by_id(record_id)
      .one(self.db)
      .await?
      .ok_or(Error::RecordNotFound)
  }

  pub async fn by_item(
    &self,
    order_item_id: i64,
  ) -> Result<Vec<commission_record::Model>> {
    Ok(
      commission_record::Entity::find()
        .filter(commission_record::Column::OrderItemId.eq(order_item_id))
        .order_by_asc(commission_record::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  /// Makes a pending record eligible for the next payout batch.
  pub async fn approve(
    &self,
    record_id: i32,
    approver_id: i64,
  ) -> Result<commission_record::Model> {
    let record = self.get(record_id).await?;

    if !record.status.can_advance_to(RecordStatus::Approved) {
      return Err(Error::RecordTransition {
        record_id,
        from: record.status,
        to: RecordStatus::Approved,
      });
    }

    let now = Utc::now().naive_utc();
    Ok(
      commission_record::ActiveModel {
        status: Set(RecordStatus::Approved),
        approved_by: Set(Some(approver_id)),
        approved_at: Set(Some(now)),
        ..record.into()
      }
      .update(self.db)
      .await?,
    )
  }

  /// Approves every pending record of an order, returns how many moved.
  pub async fn approve_order(
    &self,
    order_id: i64,
    approver_id: i64,
  ) -> Result<u64> {
    let now = Utc::now().naive_utc();

    let result = commission_record::Entity::update_many()
      .col_expr(
        commission_record::Column::Status,
        Expr::value(RecordStatus::Approved),
      )
      .col_expr(commission_record::Column::ApprovedBy, Expr::value(approver_id))
      .col_expr(commission_record::Column::ApprovedAt, Expr::value(now))
      .filter(commission_record::Column::OrderId.eq(order_id))
      .filter(commission_record::Column::Status.eq(RecordStatus::Pending))
      .exec(self.db)
      .await?;

    Ok(result.rows_affected)
  }

  /// Compensating entry for a record that must not count anymore.
  ///
  /// The original row is left untouched; a pending `reversal` with the
  /// negated amount goes through approval and batching like any other line.
  pub async fn reverse(
    &self,
    record_id: i32,
    note: impl Into<String>,
  ) -> Result<commission_record::Model> {
    let txn = self.db.begin().await?;

    let original = commission_record::Entity::find_by_id(record_id)
      .one(&txn)
      .await?
      .ok_or(Error::RecordNotFound)?;

    if original.kind == RecordKind::Reversal {
      return Err(Error::InvalidArgs("Cannot reverse a reversal".into()));
    }
    if original.status < RecordStatus::IncludedInPayout {
      return Err(Error::InvalidArgs(format!(
        "Record #{record_id} is {:?}, only batched records are reversed",
        original.status
      )));
    }

    let already = commission_record::Entity::find()
      .filter(commission_record::Column::ReversesId.eq(record_id))
      .count(&txn)
      .await?;

    if already > 0 {
      return Err(Error::InvalidArgs(format!(
        "Record #{record_id} is already reversed"
      )));
    }

    let now = Utc::now().naive_utc();
    let reversal = commission_record::ActiveModel {
      id: NotSet,
      order_id: Set(original.order_id),
      order_item_id: Set(original.order_item_id),
      rep_id: Set(original.rep_id),
      parent_rep_id: Set(original.parent_rep_id),
      amount_cents: Set(-original.amount_cents),
      rate_bp: Set(original.rate_bp),
      kind: Set(RecordKind::Reversal),
      status: Set(RecordStatus::Pending),
      calculation_date: Set(now),
      payout_id: Set(None),
      approved_by: Set(None),
      approved_at: Set(None),
      paid_at: Set(None),
      reverses_id: Set(Some(original.id)),
      notes: Set(Some(note.into())),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "Reversed commission record #{} ({}) for rep #{}",
      original.id,
      original.amount(),
      original.rep_id
    );
    Ok(reversal)
  }

  /// Per-status totals of a rep's own records calculated in `[from, to)`.
  pub async fn summary(
    &self,
    rep_id: i32,
    from: DateTime,
    to: DateTime,
  ) -> Result<CommissionSummary> {
    let own = Condition::all().add(commission_record::Column::RepId.eq(rep_id));
    self.summarize(own, from, to).await
  }

  /// Like [`Ledger::summary`], plus the records on the other side of the
  /// rep's splits: what its sub-reps kept, or what its parent received.
  pub async fn team_summary(
    &self,
    rep_id: i32,
    from: DateTime,
    to: DateTime,
  ) -> Result<CommissionSummary> {
    let team = Condition::any()
      .add(commission_record::Column::RepId.eq(rep_id))
      .add(commission_record::Column::ParentRepId.eq(rep_id));
    self.summarize(team, from, to).await
  }

  async fn summarize(
    &self,
    scope: Condition,
    from: DateTime,
    to: DateTime,
  ) -> Result<CommissionSummary> {
    type Row = (RecordStatus, Option<i64>, i64);

    let rows: Vec<Row> = commission_record::Entity::find()
      .select_only()
      .column(commission_record::Column::Status)
      .column_as(
        Expr::col(commission_record::Column::AmountCents).sum(),
        "total",
      )
      .column_as(Expr::col(commission_record::Column::Id).count(), "count")
      .filter(scope)
      .filter(commission_record::Column::CalculationDate.gte(from))
      .filter(commission_record::Column::CalculationDate.lt(to))
      .group_by(commission_record::Column::Status)
      .into_tuple()
      .all(self.db)
      .await?;

    let mut summary = CommissionSummary::default();
    for (status, cents, count) in rows {
      let slot = match status {
        RecordStatus::Pending => &mut summary.pending,
        RecordStatus::Approved => &mut summary.approved,
        RecordStatus::IncludedInPayout => &mut summary.included,
        RecordStatus::Paid => &mut summary.paid,
      };
      *slot = StatusTotal {
        amount: money::from_cents(cents.unwrap_or(0)),
        count: count as u64,
      };
    }

    Ok(summary)
  }

  /// Pending records older than `threshold_days` that concern `rep_id`,
  /// either as recipient or as the counterpart of a split.
  pub async fn delayed(
    &self,
    rep_id: i32,
    threshold_days: u32,
    now: DateTime,
  ) -> Result<Vec<commission_record::Model>> {
    let cutoff = now - TimeDelta::days(threshold_days as i64);

    Ok(
      commission_record::Entity::find()
        .filter(commission_record::Column::Status.eq(RecordStatus::Pending))
        .filter(commission_record::Column::CalculationDate.lte(cutoff))
        .filter(
          Condition::any()
            .add(commission_record::Column::RepId.eq(rep_id))
            .add(commission_record::Column::ParentRepId.eq(rep_id)),
        )
        .order_by_asc(commission_record::Column::CalculationDate)
        .all(self.db)
        .await?,
    )
  }

  /// All pending records older than `threshold_days`.
  pub async fn stale(
    &self,
    threshold_days: u32,
    now: DateTime,
  ) -> Result<Vec<commission_record::Model>> {
    let cutoff = now - TimeDelta::days(threshold_days as i64);

    Ok(
      commission_record::Entity::find()
        .filter(commission_record::Column::Status.eq(RecordStatus::Pending))
        .filter(commission_record::Column::CalculationDate.lte(cutoff))
        .order_by_asc(commission_record::Column::RepId)
        .order_by_asc(commission_record::Column::CalculationDate)
        .all(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    split,
    test_utils::{
      fixtures::{self, d, ts},
      test_db,
    },
  };

  fn item(order_item_id: i64, amount: &str) -> OrderItem {
    OrderItem {
      order_id: 1,
      order_item_id,
      amount: d(amount),
      product_id: 42,
      manufacturer_id: None,
      category_id: None,
      approved_at: ts("2024-07-01"),
    }
  }

  #[tokio::test]
  async fn test_record_direct_rep() {
    let db = test_db::setup().await;
    let rep = fixtures::rep(&db, "Solo", None, 5000).await;

    let item = item(10, "1000.00");
    let split = split::compute(item.amount, d("40"), &rep, item.approved_at)
      .unwrap();
    let records =
      Ledger::new(&db).record_commission(&item, &rep, &split).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::DirectRep);
    assert_eq!(records[0].amount(), d("400.00"));
    assert_eq!(records[0].rate(), d("40"));
    assert_eq!(records[0].status, RecordStatus::Pending);
    assert_eq!(records[0].parent_rep_id, None);
  }

  #[tokio::test]
  async fn test_record_sub_rep_with_parent() {
    let db = test_db::setup().await;
    let parent = fixtures::rep(&db, "Parent", None, 5000).await;
    let sub = fixtures::rep(&db, "Sub", Some(parent.id), 5000).await;

    let item = item(10, "1000.00");
    let split =
      split::compute(item.amount, d("40"), &sub, item.approved_at).unwrap();
    let records =
      Ledger::new(&db).record_commission(&item, &sub, &split).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, RecordKind::SubRepShare);
    assert_eq!(records[0].rep_id, sub.id);
    assert_eq!(records[0].parent_rep_id, Some(parent.id));
    assert_eq!(records[0].amount(), d("200.00"));

    assert_eq!(records[1].kind, RecordKind::ParentRepShare);
    assert_eq!(records[1].rep_id, parent.id);
    assert_eq!(records[1].parent_rep_id, Some(sub.id));
    assert_eq!(records[1].amount(), d("200.00"));
  }

  #[tokio::test]
  async fn test_zero_parent_share_skips_parent_row() {
    let db = test_db::setup().await;
    let parent = fixtures::rep(&db, "Parent", None, 5000).await;
    let sub = fixtures::rep(&db, "Sub", Some(parent.id), 0).await;

    let item = item(10, "100.00");
    let split =
      split::compute(item.amount, d("10"), &sub, item.approved_at).unwrap();
    let records =
      Ledger::new(&db).record_commission(&item, &sub, &split).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::SubRepShare);
    assert_eq!(records[0].amount(), d("10.00"));
  }

  #[tokio::test]
  async fn test_second_recording_rejected() {
    let db = test_db::setup().await;
    let parent = fixtures::rep(&db, "Parent", None, 5000).await;
    let sub = fixtures::rep(&db, "Sub", Some(parent.id), 5000).await;
    let ledger = Ledger::new(&db);

    let item = item(10, "500.00");
    let split =
      split::compute(item.amount, d("10"), &sub, item.approved_at).unwrap();
    ledger.record_commission(&item, &sub, &split).await.unwrap();

    let again = ledger.record_commission(&item, &sub, &split).await;
    assert!(matches!(again, Err(Error::AlreadyRecorded(10))));
    assert_eq!(ledger.by_item(10).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_approve_moves_forward_only() {
    let db = test_db::setup().await;
    let rep = fixtures::rep(&db, "Rep", None, 5000).await;
    let record = fixtures::record(
      &db,
      rep.id,
      10,
      1_000,
      RecordStatus::Pending,
      ts("2024-07-01"),
    )
    .await;
    let ledger = Ledger::new(&db);

    let approved = ledger.approve(record.id, 99).await.unwrap();
    assert_eq!(approved.status, RecordStatus::Approved);
    assert_eq!(approved.approved_by, Some(99));
    assert!(approved.approved_at.is_some());

    let again = ledger.approve(record.id, 99).await;
    assert!(matches!(
      again,
      Err(Error::RecordTransition { from: RecordStatus::Approved, .. })
    ));
  }

  #[tokio::test]
  async fn test_approve_order() {
    let db = test_db::setup().await;
    let rep = fixtures::rep(&db, "Rep", None, 5000).await;
    let at = ts("2024-07-01");

    // order ids are order_item_id / 10 in fixtures
    fixtures::record(&db, rep.id, 10, 100, RecordStatus::Pending, at).await;
    fixtures::record(&db, rep.id, 11, 100, RecordStatus::Pending, at).await;
    fixtures::record(&db, rep.id, 12, 100, RecordStatus::Paid, at).await;
    fixtures::record(&db, rep.id, 20, 100, RecordStatus::Pending, at).await;

    let moved = Ledger::new(&db).approve_order(1, 7).await.unwrap();
    assert_eq!(moved, 2);

    let summary = Ledger::new(&db)
      .summary(rep.id, ts("2024-07-01"), ts("2024-08-01"))
      .await
      .unwrap();
    assert_eq!(summary.approved.count, 2);
    assert_eq!(summary.pending.count, 1);
    assert_eq!(summary.paid.count, 1);
  }

  #[tokio::test]
  async fn test_reverse_creates_compensating_record() {
    let db = test_db::setup().await;
    let rep = fixtures::rep(&db, "Rep", None, 5000).await;
    let record = fixtures::record(
      &db,
      rep.id,
      10,
      12_345,
      RecordStatus::Paid,
      ts("2024-07-01"),
    )
    .await;
    let ledger = Ledger::new(&db);

    let reversal = ledger.reverse(record.id, "order returned").await.unwrap();
    assert_eq!(reversal.kind, RecordKind::Reversal);
    assert_eq!(reversal.amount(), d("-123.45"));
    assert_eq!(reversal.reverses_id, Some(record.id));
    assert_eq!(reversal.status, RecordStatus::Pending);

    // history untouched
    let original = ledger.get(record.id).await.unwrap();
    assert_eq!(original, record);

    assert!(matches!(
      ledger.reverse(record.id, "twice").await,
      Err(Error::InvalidArgs(_))
    ));
    assert!(matches!(
      ledger.reverse(reversal.id, "nested").await,
      Err(Error::InvalidArgs(_))
    ));

    let pending = fixtures::record(
      &db,
      rep.id,
      11,
      500,
      RecordStatus::Pending,
      ts("2024-07-01"),
    )
    .await;
    assert!(matches!(
      ledger.reverse(pending.id, "too early").await,
      Err(Error::InvalidArgs(_))
    ));
  }

  #[tokio::test]
  async fn test_summary_by_status_and_period() {
    let db = test_db::setup().await;
    let rep = fixtures::rep(&db, "Rep", None, 5000).await;
    let other = fixtures::rep(&db, "Other", None, 5000).await;

    use RecordStatus::*;
    for (item, cents, status, date) in [
      (10, 1_000, Pending, "2024-07-02"),
      (11, 2_550, Pending, "2024-07-15"),
      (12, 4_000, Approved, "2024-07-20"),
      (13, 500, Paid, "2024-07-31"),
      (14, 9_999, Paid, "2024-08-01"),
      (15, 9_999, Pending, "2024-06-30"),
    ] {
      fixtures::record(&db, rep.id, item, cents, status, ts(date)).await;
    }
    fixtures::record(&db, other.id, 16, 777, Pending, ts("2024-07-10")).await;

    let summary = Ledger::new(&db)
      .summary(rep.id, ts("2024-07-01"), ts("2024-08-01"))
      .await
      .unwrap();

    assert_eq!(summary.pending, StatusTotal { amount: d("35.50"), count: 2 });
    assert_eq!(summary.approved, StatusTotal { amount: d("40.00"), count: 1 });
    assert_eq!(summary.included, StatusTotal::default());
    assert_eq!(summary.paid, StatusTotal { amount: d("5.00"), count: 1 });
    assert_eq!(summary.total(), d("80.50"));
  }

  #[tokio::test]
  async fn test_team_summary_adds_split_counterparts() {
    let db = test_db::setup().await;
    let parent = fixtures::rep(&db, "Parent", None, 5000).await;
    let sub = fixtures::rep(&db, "Sub", Some(parent.id), 2500).await;
    let ledger = Ledger::new(&db);

    let sold = item(10, "1000.00");
    let split =
      split::compute(sold.amount, d("10"), &sub, ts("2024-07-05")).unwrap();
    ledger.record_commission(&sold, &sub, &split).await.unwrap();

    // outside the period
    let early = item(11, "1000.00");
    let split =
      split::compute(early.amount, d("10"), &sub, ts("2024-06-05")).unwrap();
    ledger.record_commission(&early, &sub, &split).await.unwrap();

    let (from, to) = (ts("2024-07-01"), ts("2024-08-01"));

    let own = ledger.summary(parent.id, from, to).await.unwrap();
    assert_eq!(own.pending, StatusTotal { amount: d("25.00"), count: 1 });

    let team = ledger.team_summary(parent.id, from, to).await.unwrap();
    assert_eq!(team.pending, StatusTotal { amount: d("100.00"), count: 2 });
    assert_eq!(team.total(), d("100.00"));

    let loner = fixtures::rep(&db, "Loner", None, 5000).await;
    let empty = ledger.team_summary(loner.id, from, to).await.unwrap();
    assert_eq!(empty, CommissionSummary::default());
  }

  #[tokio::test]
  async fn test_delayed_includes_parent_side() {
    let db = test_db::setup().await;
    let parent = fixtures::rep(&db, "Parent", None, 5000).await;
    let sub = fixtures::rep(&db, "Sub", Some(parent.id), 5000).await;
    let ledger = Ledger::new(&db);

    let old = item(10, "1000.00");
    let split =
      split::compute(old.amount, d("10"), &sub, ts("2024-05-01")).unwrap();
    ledger.record_commission(&old, &sub, &split).await.unwrap();

    let fresh = item(11, "1000.00");
    let split =
      split::compute(fresh.amount, d("10"), &sub, ts("2024-06-25")).unwrap();
    ledger.record_commission(&fresh, &sub, &split).await.unwrap();

    let now = ts("2024-07-01");

    // both sides of the old split, for either rep
    for rep_id in [sub.id, parent.id] {
      let delayed = ledger.delayed(rep_id, 30, now).await.unwrap();
      assert_eq!(delayed.len(), 2);
      assert!(delayed.iter().all(|r| r.order_item_id == 10));
    }

    let outsider = fixtures::rep(&db, "Outsider", None, 5000).await;
    assert!(ledger.delayed(outsider.id, 30, now).await.unwrap().is_empty());

    assert_eq!(ledger.stale(30, now).await.unwrap().len(), 2);
    assert_eq!(ledger.stale(0, now).await.unwrap().len(), 4);
  }
}
