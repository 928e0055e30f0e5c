pub use sea_orm_migration::prelude::*;

mod m20250108_000001_create_sales_reps;
mod m20250108_000002_create_commission_rules;
mod m20250108_000003_create_commission_payouts;
mod m20250108_000004_create_commission_records;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20250108_000001_create_sales_reps::Migration),
      Box::new(m20250108_000002_create_commission_rules::Migration),
      Box::new(m20250108_000003_create_commission_payouts::Migration),
      Box::new(m20250108_000004_create_commission_records::Migration),
    ]
  }
}
