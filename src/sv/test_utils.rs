//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    // Reps first, everything else references them
    let stmt = schema.create_table_from_entity(sales_rep::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(commission_rule::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(commission_payout::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(commission_record::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }
}

#[cfg(test)]
pub mod fixtures {
  use chrono::NaiveDate;
  use sea_orm::{ActiveValue::NotSet, DatabaseConnection};

  use crate::{
    entity::{RecordKind, RecordStatus, commission_record, sales_rep},
    prelude::*,
  };

  pub fn d(s: &str) -> Decimal {
    s.parse().unwrap()
  }

  /// Midnight of `YYYY-MM-DD`.
  pub fn ts(s: &str) -> DateTime {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap()
  }

  pub async fn rep(
    db: &DatabaseConnection,
    name: &str,
    parent_rep_id: Option<i32>,
    parent_share_bp: i32,
  ) -> sales_rep::Model {
    sales_rep::ActiveModel {
      id: NotSet,
      name: Set(name.to_string()),
      email: Set(None),
      territory: Set(None),
      commission_rate_direct_bp: Set(500),
      parent_share_bp: Set(parent_share_bp),
      parent_rep_id: Set(parent_rep_id),
      is_active: Set(true),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
  }

  /// Inserts a direct record straight into the ledger with the given status.
  pub async fn record(
    db: &DatabaseConnection,
    rep_id: i32,
    order_item_id: i64,
    amount_cents: i64,
    status: RecordStatus,
    calculation_date: DateTime,
  ) -> commission_record::Model {
    commission_record::ActiveModel {
      id: NotSet,
      order_id: Set(order_item_id / 10),
      order_item_id: Set(order_item_id),
      rep_id: Set(rep_id),
      parent_rep_id: Set(None),
      amount_cents: Set(amount_cents),
      rate_bp: Set(1000),
      kind: Set(RecordKind::DirectRep),
      status: Set(status),
      calculation_date: Set(calculation_date),
      payout_id: Set(None),
      approved_by: Set(None),
      approved_at: Set(None),
      paid_at: Set(None),
      reverses_id: Set(None),
      notes: Set(None),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
  }
}
