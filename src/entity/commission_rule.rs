use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TargetType {
  #[sea_orm(string_value = "product")]
  Product,
  #[sea_orm(string_value = "manufacturer")]
  Manufacturer,
  #[sea_orm(string_value = "category")]
  Category,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_rules")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub target_type: TargetType,
  pub target_id: i64,
  pub rate_bp: i32,
  pub valid_from: DateTime,
  /// Exclusive upper bound; `None` is open-ended.
  pub valid_to: Option<DateTime>,
  pub is_active: bool,
  pub description: Option<String>,
  pub created_at: DateTime,
  pub deleted_at: Option<DateTime>,
}

impl Model {
  pub fn rate(&self) -> Decimal {
    money::from_bp(self.rate_bp)
  }

  /// Half-open windows `[from, to)` intersect.
  pub fn overlaps(&self, from: DateTime, to: Option<DateTime>) -> bool {
    let starts_before_end = to.is_none_or(|to| self.valid_from < to);
    let ends_after_start = self.valid_to.is_none_or(|end| from < end);
    starts_before_end && ends_after_start
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
