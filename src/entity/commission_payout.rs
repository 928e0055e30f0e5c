use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{commission_record, sales_rep};
use crate::money;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PayoutStatus {
  #[sea_orm(string_value = "calculated")]
  #[default]
  Calculated,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "processed")]
  Processed,
}

impl PayoutStatus {
  /// The only state reachable from `self`, if any.
  pub fn next(self) -> Option<Self> {
    match self {
      Self::Calculated => Some(Self::Approved),
      Self::Approved => Some(Self::Processed),
      Self::Processed => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_payouts")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub rep_id: i32,
  #[sea_orm(unique)]
  pub batch_number: String,
  pub period_start: DateTime,
  pub period_end: DateTime,
  pub total_cents: i64,
  pub record_count: i32,
  pub status: PayoutStatus,
  pub approved_by: Option<i64>,
  pub approved_at: Option<DateTime>,
  pub processed_at: Option<DateTime>,
  pub payment_reference: Option<String>,
  pub notes: Option<String>,
  pub created_at: DateTime,
}

impl Model {
  pub fn total(&self) -> Decimal {
    money::from_cents(self.total_cents)
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
  #[sea_orm(has_many = "commission_record::Entity")]
  Records,
}

impl Related<sales_rep::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Rep.def()
  }
}

impl Related<commission_record::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Records.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
