use sea_orm::{ActiveValue::NotSet, sea_query::Expr};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  config::Config,
  entity::{
    PayoutStatus, RecordStatus, commission_payout, commission_record,
    sales_rep,
  },
  prelude::*,
};

/// SQLite caps bound parameters per statement.
const CLAIM_CHUNK: usize = 500;

type ClaimKey = (i32, DateTime, DateTime);

/// In-process serialization of payout batching per (rep, period).
///
/// Other processes are kept out by the conditional claim update itself.
pub struct Claims {
  locks: DashMap<ClaimKey, Arc<Mutex<()>>>,
  retries: u32,
  backoff: Duration,
  /// Claims to lose on purpose, simulating a faster competing process.
  #[cfg(test)]
  lose: std::sync::atomic::AtomicU32,
}

impl Claims {
  pub fn new(retries: u32, backoff: Duration) -> Self {
    Self {
      locks: DashMap::new(),
      retries,
      backoff,
      #[cfg(test)]
      lose: Default::default(),
    }
  }

  #[cfg(test)]
  fn lose_next(&self, attempts: u32) {
    self.lose.store(attempts, std::sync::atomic::Ordering::SeqCst);
  }

  #[cfg(test)]
  fn should_lose(&self) -> bool {
    use std::sync::atomic::Ordering::SeqCst;
    self.lose.fetch_update(SeqCst, SeqCst, |n| n.checked_sub(1)).is_ok()
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.claim_retries, config.claim_backoff)
  }

  fn lock_for(&self, key: ClaimKey) -> Arc<Mutex<()>> {
    self.locks.entry(key).or_default().clone()
  }

  fn release(&self, key: &ClaimKey) {
    self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
  }

  pub fn held(&self) -> usize {
    self.locks.len()
  }
}

impl Default for Claims {
  fn default() -> Self {
    Self::from_config(&Config::default())
  }
}

pub struct Payouts<'a> {
  db: &'a DatabaseConnection,
  claims: &'a Claims,
}

impl<'a> Payouts<'a> {
  pub fn new(db: &'a DatabaseConnection, claims: &'a Claims) -> Self {
    Self { db, claims }
  }

  pub async fn get(&self, payout_id: i32) -> Result<commission_payout::Model> {
    commission_payout::Entity::find_by_id(payout_id)
      .one(self.db)
      .await?
      .ok_or(Error::PayoutNotFound)
  }

  pub async fn by_rep(
    &self,
    rep_id: i32,
  ) -> Result<Vec<commission_payout::Model>> {
    Ok(
      commission_payout::Entity::find()
        .filter(commission_payout::Column::RepId.eq(rep_id))
        .order_by_desc(commission_payout::Column::PeriodStart)
        .order_by_desc(commission_payout::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  /// Bundles the rep's approved, unclaimed records of `[start, end)` into a
  /// new `calculated` payout.
  ///
  /// Approved reversals are netted in, so the total may be zero or negative
  /// (a clawback). Lost claims are retried with a growing backoff before
  /// `ConcurrentClaimConflict` is returned.
  pub async fn batch_for_payout(
    &self,
    rep_id: i32,
    start: DateTime,
    end: DateTime,
  ) -> Result<commission_payout::Model> {
    if end <= start {
      return Err(Error::InvalidArgs(format!(
        "Payout period ends ({end}) before it starts ({start})"
      )));
    }

    sales_rep::Entity::find_by_id(rep_id)
      .one(self.db)
      .await?
      .ok_or(Error::RepNotFound)?;

    let key = (rep_id, start, end);
    let lock = self.claims.lock_for(key);

    let result = {
      let _guard = lock.lock().await;
      let mut attempt = 0;
      loop {
        match self.try_batch(rep_id, start, end).await {
          Err(Error::ConcurrentClaimConflict { expected, claimed, .. })
            if attempt < self.claims.retries =>
          {
            attempt += 1;
            warn!(
              "Payout claim for rep #{rep_id} lost ({claimed}/{expected}), \
               retry {attempt}/{}",
              self.claims.retries
            );
            tokio::time::sleep(self.claims.backoff * attempt).await;
          }
          other => break other,
        }
      }
    };

    drop(lock);
    self.claims.release(&key);

    result
  }

  async fn try_batch(
    &self,
    rep_id: i32,
    start: DateTime,
    end: DateTime,
  ) -> Result<commission_payout::Model> {
    let txn = self.db.begin().await?;

    let records = eligible(&txn, rep_id, start, end).await?;
    if records.is_empty() {
      return Err(Error::EmptyBatch { rep_id });
    }

    let total_cents: i64 = records.iter().map(|r| r.amount_cents).sum();
    let record_count = i32::try_from(records.len()).map_err(|_| {
      Error::InvalidArgs(format!("{} records in one payout", records.len()))
    })?;

    let payout = commission_payout::ActiveModel {
      id: NotSet,
      rep_id: Set(rep_id),
      batch_number: Set(batch_number(rep_id, start)),
      period_start: Set(start),
      period_end: Set(end),
      total_cents: Set(total_cents),
      record_count: Set(record_count),
      status: Set(PayoutStatus::Calculated),
      approved_by: Set(None),
      approved_at: Set(None),
      processed_at: Set(None),
      payment_reference: Set(None),
      notes: Set(None),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    #[cfg(test)]
    if self.claims.should_lose() {
      commission_record::Entity::update_many()
        .col_expr(commission_record::Column::PayoutId, Expr::value(payout.id))
        .filter(commission_record::Column::Id.eq(records[0].id))
        .exec(&txn)
        .await?;
    }

    if let Err(err) = claim(&txn, &payout, &records).await {
      txn.rollback().await?;
      return Err(err);
    }

    txn.commit().await?;

    info!(
      "Payout {} for rep #{}: {} records, total {}",
      payout.batch_number,
      rep_id,
      payout.record_count,
      payout.total()
    );
    Ok(payout)
  }
}

/// Approved records of `rep_id` in `[start, end)` not yet in any payout.
pub(crate) async fn eligible<C: ConnectionTrait>(
  conn: &C,
  rep_id: i32,
  start: DateTime,
  end: DateTime,
) -> Result<Vec<commission_record::Model>> {
  Ok(
    commission_record::Entity::find()
      .filter(commission_record::Column::RepId.eq(rep_id))
      .filter(commission_record::Column::Status.eq(RecordStatus::Approved))
      .filter(commission_record::Column::PayoutId.is_null())
      .filter(commission_record::Column::CalculationDate.gte(start))
      .filter(commission_record::Column::CalculationDate.lt(end))
      .order_by_asc(commission_record::Column::Id)
      .all(conn)
      .await?,
  )
}

/// Attaches `records` to `payout`, touching only rows that are still
/// approved and unclaimed. Fails unless every record was claimed.
pub(crate) async fn claim<C: ConnectionTrait>(
  conn: &C,
  payout: &commission_payout::Model,
  records: &[commission_record::Model],
) -> Result<u64> {
  let ids: Vec<i32> = records.iter().map(|r| r.id).collect();
  let expected = ids.len() as u64;

  let mut claimed = 0;
  for chunk in ids.chunks(CLAIM_CHUNK) {
    let result = commission_record::Entity::update_many()
      .col_expr(commission_record::Column::PayoutId, Expr::value(payout.id))
      .col_expr(
        commission_record::Column::Status,
        Expr::value(RecordStatus::IncludedInPayout),
      )
      .filter(commission_record::Column::Id.is_in(chunk.iter().copied()))
      .filter(commission_record::Column::PayoutId.is_null())
      .filter(commission_record::Column::Status.eq(RecordStatus::Approved))
      .exec(conn)
      .await?;
    claimed += result.rows_affected;
  }

  if claimed != expected {
    return Err(Error::ConcurrentClaimConflict {
      rep_id: payout.rep_id,
      expected,
      claimed,
    });
  }

  trace!("Claimed {claimed} records for payout #{}", payout.id);
  Ok(claimed)
}

/// `CP-YYYYMM-rrrr-xxxxxxxx`
fn batch_number(rep_id: i32, start: DateTime) -> String {
  let suffix = Uuid::new_v4().simple().to_string();
  format!("CP-{}-{:04}-{}", start.format("%Y%m"), rep_id, &suffix[..8])
}
