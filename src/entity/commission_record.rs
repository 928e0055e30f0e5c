use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{commission_payout, sales_rep};
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RecordKind {
  /// Rep without a parent keeps the whole commission.
  #[sea_orm(string_value = "direct-rep")]
  DirectRep,
  /// Rep with a parent keeps what is left after the parent's share.
  #[sea_orm(string_value = "sub-rep-share")]
  SubRepShare,
  #[sea_orm(string_value = "parent-rep-share")]
  ParentRepShare,
  /// Compensating entry negating an earlier record.
  #[sea_orm(string_value = "reversal")]
  Reversal,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RecordStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "included_in_payout")]
  IncludedInPayout,
  #[sea_orm(string_value = "paid")]
  Paid,
}

impl RecordStatus {
  /// Status only moves forward, one step at a time.
  pub fn can_advance_to(self, to: Self) -> bool {
    matches!(
      (self, to),
      (Self::Pending, Self::Approved)
        | (Self::Approved, Self::IncludedInPayout)
        | (Self::IncludedInPayout, Self::Paid)
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_records")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub order_id: i64,
  pub order_item_id: i64,
  pub rep_id: i32,
  pub parent_rep_id: Option<i32>,
  pub amount_cents: i64,
  pub rate_bp: i32,
  pub kind: RecordKind,
  pub status: RecordStatus,
  pub calculation_date: DateTime,
  pub payout_id: Option<i32>,
  pub approved_by: Option<i64>,
  pub approved_at: Option<DateTime>,
  pub paid_at: Option<DateTime>,
  pub reverses_id: Option<i32>,
  pub notes: Option<String>,
  pub created_at: DateTime,
}

impl Model {
  pub fn amount(&self) -> Decimal {
    money::from_cents(self.amount_cents)
  }

  pub fn rate(&self) -> Decimal {
    money::from_bp(self.rate_bp)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "sales_rep::Entity",
    from = "Column::RepId",
    to = "sales_rep::Column::Id"
  )]
  Rep,
  #[sea_orm(
    belongs_to = "sales_rep::Entity",
    from = "Column::ParentRepId",
    to = "sales_rep::Column::Id",
    on_delete = "SetNull"
  )]
  ParentRep,
  #[sea_orm(
    belongs_to = "commission_payout::Entity",
    from = "Column::PayoutId",
    to = "commission_payout::Column::Id"
  )]
  Payout,
}

impl Related<sales_rep::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Rep.def()
  }
}

impl Related<commission_payout::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payout.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
