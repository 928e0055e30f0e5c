use sea_orm::DbErr;

use crate::entity::{PayoutStatus, RecordStatus, TargetType};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("no commission rule for {target:?} #{target_id} at {at}")]
  RateNotFound { target: TargetType, target_id: i64, at: chrono::NaiveDateTime },

  #[error("payout #{payout_id} is {from:?}, cannot move to {to:?}")]
  InvalidStateTransition {
    payout_id: i32,
    from: PayoutStatus,
    to: PayoutStatus,
  },

  #[error("commission record #{record_id} is {from:?}, cannot move to {to:?}")]
  RecordTransition { record_id: i32, from: RecordStatus, to: RecordStatus },

  #[error("no approved commissions for rep #{rep_id} in period")]
  EmptyBatch { rep_id: i32 },

  #[error("claimed {claimed} of {expected} records for rep #{rep_id}")]
  ConcurrentClaimConflict { rep_id: i32, expected: u64, claimed: u64 },

  #[error("negative input: {0}")]
  NegativeAmount(String),

  #[error("payout #{payout_id} total {total} does not match records {records}")]
  PayoutTotalMismatch { payout_id: i32, total: i64, records: i64 },

  #[error("commission for order item #{0} already recorded")]
  AlreadyRecorded(i64),

  #[error("rule overlaps active rule #{0}")]
  RuleOverlap(i32),

  #[error("rep #{0} would become its own ancestor")]
  HierarchyCycle(i32),

  #[error("sales rep not found")]
  RepNotFound,

  #[error("sales rep #{0} is inactive")]
  RepInactive(i32),

  #[error("commission rule not found")]
  RuleNotFound,

  #[error("commission record not found")]
  RecordNotFound,

  #[error("commission payout not found")]
  PayoutNotFound,

  #[error("invalid arguments: {0}")]
  InvalidArgs(String),

  #[error("database error: {0}")]
  Db(#[from] DbErr),
}

impl Error {
  /// Conditions a caller may skip or retry instead of surfacing.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      Self::RateNotFound { .. }
        | Self::EmptyBatch { .. }
        | Self::ConcurrentClaimConflict { .. }
    )
  }
}
