use sea_orm::sea_query::Expr;

use crate::{
  entity::{PayoutStatus, RecordStatus, commission_payout, commission_record},
  prelude::*,
};

/// Payout lifecycle: calculated, approved, processed.
pub struct Reconciler<'a> {
  db: &'a DatabaseConnection,
}

fn transition(
  payout: &commission_payout::Model,
  to: PayoutStatus,
) -> Result<()> {
  if payout.status.next() != Some(to) {
    return Err(Error::InvalidStateTransition {
      payout_id: payout.id,
      from: payout.status,
      to,
    });
  }
  Ok(())
}

impl<'a> Reconciler<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self, payout_id: i32) -> Result<commission_payout::Model> {
    commission_payout::Entity::find_by_id(payout_id)
      .one(self.db)
      .await?
      .ok_or(Error::PayoutNotFound)
  }

  pub async fn records(
    &self,
    payout_id: i32,
  ) -> Result<Vec<commission_record::Model>> {
    Ok(
      commission_record::Entity::find()
        .filter(commission_record::Column::PayoutId.eq(payout_id))
        .order_by_asc(commission_record::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn approve(
    &self,
    payout_id: i32,
    approver_id: i64,
  ) -> Result<commission_payout::Model> {
    let txn = self.db.begin().await?;

    let payout = commission_payout::Entity::find_by_id(payout_id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    transition(&payout, PayoutStatus::Approved)?;

    let (sum, count): (Option<i64>, i64) = commission_record::Entity::find()
      .select_only()
      .column_as(
        Expr::col(commission_record::Column::AmountCents).sum(),
        "total",
      )
      .column_as(Expr::col(commission_record::Column::Id).count(), "count")
      .filter(commission_record::Column::PayoutId.eq(payout_id))
      .into_tuple()
      .one(&txn)
      .await?
      .unwrap_or((None, 0));

    let records = sum.unwrap_or(0);
    if records != payout.total_cents || count != payout.record_count as i64 {
      error!(
        "Payout #{payout_id} drifted: {} cents in {} records, stored {} in {}",
        records, count, payout.total_cents, payout.record_count
      );
      return Err(Error::PayoutTotalMismatch {
        payout_id,
        total: payout.total_cents,
        records,
      });
    }

    let payout = commission_payout::ActiveModel {
      status: Set(PayoutStatus::Approved),
      approved_by: Set(Some(approver_id)),
      approved_at: Set(Some(Utc::now().naive_utc())),
      ..payout.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    info!("Payout {} approved by {}", payout.batch_number, approver_id);
    Ok(payout)
  }

  /// Records the payment and marks every record of the payout as paid.
  pub async fn mark_processed(
    &self,
    payout_id: i32,
    payment_reference: &str,
  ) -> Result<commission_payout::Model> {
    let reference = payment_reference.trim();
    if reference.is_empty() {
      return Err(Error::InvalidArgs("Payment reference is empty".into()));
    }

    let txn = self.db.begin().await?;

    let payout = commission_payout::Entity::find_by_id(payout_id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    transition(&payout, PayoutStatus::Processed)?;

    let now = Utc::now().naive_utc();
    let payout = commission_payout::ActiveModel {
      status: Set(PayoutStatus::Processed),
      processed_at: Set(Some(now)),
      payment_reference: Set(Some(reference.to_string())),
      ..payout.into()
    }
    .update(&txn)
    .await?;

    let paid = commission_record::Entity::update_many()
      .col_expr(commission_record::Column::Status, Expr::value(RecordStatus::Paid))
      .col_expr(commission_record::Column::PaidAt, Expr::value(now))
      .filter(commission_record::Column::PayoutId.eq(payout_id))
      .filter(
        commission_record::Column::Status.eq(RecordStatus::IncludedInPayout),
      )
      .exec(&txn)
      .await?;

    txn.commit().await?;

    info!(
      "Payout {} processed ({}), {} records paid",
      payout.batch_number, reference, paid.rows_affected
    );
    Ok(payout)
  }

  pub async fn annotate(
    &self,
    payout_id: i32,
    notes: impl Into<String>,
  ) -> Result<commission_payout::Model> {
    let payout = self.get(payout_id).await?;

    Ok(
      commission_payout::ActiveModel {
        notes: Set(Some(notes.into())),
        ..payout.into()
      }
      .update(self.db)
      .await?,
    )
  }

  /// Overwrites the reference without touching the status.
  pub async fn set_payment_reference(
    &self,
    payout_id: i32,
    reference: &str,
  ) -> Result<commission_payout::Model> {
    let reference = reference.trim();
    if reference.is_empty() {
      return Err(Error::InvalidArgs("Payment reference is empty".into()));
    }

    let payout = self.get(payout_id).await?;

    Ok(
      commission_payout::ActiveModel {
        payment_reference: Set(Some(reference.to_string())),
        ..payout.into()
      }
      .update(self.db)
      .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    Ledger, month_bounds,
    payout::{Claims, Payouts},
    test_utils::{
      fixtures::{self, ts},
      test_db,
    },
  };

  async fn calculated_payout(
    db: &DatabaseConnection,
  ) -> commission_payout::Model {
    let rep = fixtures::rep(db, "Rep", None, 5000).await;
    for (item, cents) in [(10, 1_000), (11, 2_345)] {
      fixtures::record(
        db,
        rep.id,
        item,
        cents,
        RecordStatus::Approved,
        ts("2024-07-10"),
      )
      .await;
    }

    let claims = Claims::default();
    Payouts::new(db, &claims)
      .batch_for_payout(rep.id, ts("2024-07-01"), ts("2024-08-01"))
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_full_lifecycle() {
    let db = test_db::setup().await;
    let payout = calculated_payout(&db).await;
    let rc = Reconciler::new(&db);

    let approved = rc.approve(payout.id, 7).await.unwrap();
    assert_eq!(approved.status, PayoutStatus::Approved);
    assert_eq!(approved.approved_by, Some(7));
    assert!(approved.approved_at.is_some());

    // approval leaves records alone
    let records = rc.records(payout.id).await.unwrap();
    assert!(records.iter().all(|r| r.status == RecordStatus::IncludedInPayout));

    let processed = rc.mark_processed(payout.id, " TX-1 ").await.unwrap();
    assert_eq!(processed.status, PayoutStatus::Processed);
    assert_eq!(processed.payment_reference.as_deref(), Some("TX-1"));
    assert!(processed.processed_at.is_some());

    let records = rc.records(payout.id).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in records {
      assert_eq!(record.status, RecordStatus::Paid);
      assert_eq!(record.paid_at, processed.processed_at);
    }
  }

  #[tokio::test]
  async fn test_no_skips_or_backwards_moves() {
    let db = test_db::setup().await;
    let payout = calculated_payout(&db).await;
    let rc = Reconciler::new(&db);

    let skip = rc.mark_processed(payout.id, "TX-1").await;
    assert!(matches!(
      skip,
      Err(Error::InvalidStateTransition {
        from: PayoutStatus::Calculated,
        to: PayoutStatus::Processed,
        ..
      })
    ));
    // nothing leaked into records
    let records = rc.records(payout.id).await.unwrap();
    assert!(records.iter().all(|r| r.paid_at.is_none()));

    rc.approve(payout.id, 1).await.unwrap();
    assert!(matches!(
      rc.approve(payout.id, 1).await,
      Err(Error::InvalidStateTransition { from: PayoutStatus::Approved, .. })
    ));

    rc.mark_processed(payout.id, "TX-1").await.unwrap();
    assert!(matches!(
      rc.mark_processed(payout.id, "TX-2").await,
      Err(Error::InvalidStateTransition { from: PayoutStatus::Processed, .. })
    ));
    assert!(matches!(
      rc.approve(payout.id, 1).await,
      Err(Error::InvalidStateTransition { from: PayoutStatus::Processed, .. })
    ));
  }

  #[tokio::test]
  async fn test_total_drift_blocks_approval() {
    let db = test_db::setup().await;
    let payout = calculated_payout(&db).await;

    commission_payout::ActiveModel {
      total_cents: Set(payout.total_cents + 1),
      ..payout.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    let result = Reconciler::new(&db).approve(payout.id, 1).await;
    assert!(matches!(
      result,
      Err(Error::PayoutTotalMismatch { total: 3_346, records: 3_345, .. })
    ));
    assert_eq!(
      Reconciler::new(&db).get(payout.id).await.unwrap().status,
      PayoutStatus::Calculated
    );
  }

  #[tokio::test]
  async fn test_annotations_in_any_state() {
    let db = test_db::setup().await;
    let payout = calculated_payout(&db).await;
    let rc = Reconciler::new(&db);

    let noted = rc.annotate(payout.id, "July run").await.unwrap();
    assert_eq!(noted.notes.as_deref(), Some("July run"));
    assert_eq!(noted.status, PayoutStatus::Calculated);

    rc.approve(payout.id, 1).await.unwrap();
    rc.mark_processed(payout.id, "TX-1").await.unwrap();

    let fixed = rc.set_payment_reference(payout.id, "TX-1b").await.unwrap();
    assert_eq!(fixed.payment_reference.as_deref(), Some("TX-1b"));
    assert_eq!(fixed.status, PayoutStatus::Processed);

    assert!(matches!(
      rc.set_payment_reference(payout.id, "  ").await,
      Err(Error::InvalidArgs(_))
    ));
    assert!(matches!(
      rc.annotate(payout.id + 1, "missing").await,
      Err(Error::PayoutNotFound)
    ));
  }

  #[tokio::test]
  async fn test_reversal_nets_into_next_payout() {
    let db = test_db::setup().await;
    let claims = Claims::default();
    let ledger = Ledger::new(&db);
    let rc = Reconciler::new(&db);

    let rep = fixtures::rep(&db, "Rep", None, 5000).await;
    let paid = fixtures::record(
      &db,
      rep.id,
      10,
      10_000,
      RecordStatus::Paid,
      ts("2024-06-10"),
    )
    .await;

    // reversals are dated when they are written
    let (start, end) = month_bounds(Utc::now().date_naive());
    let reversal = ledger.reverse(paid.id, "returned").await.unwrap();
    ledger.approve(reversal.id, 1).await.unwrap();
    fixtures::record(&db, rep.id, 11, 2_500, RecordStatus::Approved, start).await;

    let payout = Payouts::new(&db, &claims)
      .batch_for_payout(rep.id, start, end)
      .await
      .unwrap();
    assert_eq!(payout.record_count, 2);
    assert_eq!(payout.total_cents, -7_500);

    let records = rc.records(payout.id).await.unwrap();
    assert_eq!(
      records.iter().map(|r| r.amount_cents).sum::<i64>(),
      payout.total_cents
    );

    // a clawback still goes through the normal lifecycle
    rc.approve(payout.id, 1).await.unwrap();
    let done = rc.mark_processed(payout.id, "CLAWBACK-1").await.unwrap();
    assert_eq!(done.status, PayoutStatus::Processed);
    assert!(
      rc.records(payout.id)
        .await
        .unwrap()
        .iter()
        .all(|r| r.status == RecordStatus::Paid)
    );
  }
}
