use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{commission_payout, commission_record};
use crate::money;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_reps")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub name: String,
  pub email: Option<String>,
  pub territory: Option<String>,
  /// Hundredths of a percent.
  pub commission_rate_direct_bp: i32,
  /// Hundredths of a percent of a sub-rep's commission passed to the parent.
  pub parent_share_bp: i32,
  pub parent_rep_id: Option<i32>,
  pub is_active: bool,
  pub created_at: DateTime,
}

impl Model {
  pub fn direct_rate(&self) -> Decimal {
    money::from_bp(self.commission_rate_direct_bp)
  }

  pub fn parent_share(&self) -> Decimal {
    money::from_bp(self.parent_share_bp)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "Entity",
    from = "Column::ParentRepId",
    to = "Column::Id",
    on_delete = "SetNull"
  )]
  Parent,
  #[sea_orm(has_many = "commission_record::Entity")]
  Records,
  #[sea_orm(has_many = "commission_payout::Entity")]
  Payouts,
}

impl Related<commission_record::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Records.def()
  }
}

impl Related<commission_payout::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payouts.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
