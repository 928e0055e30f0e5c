use sea_orm_migration::prelude::*;

use super::m20250108_000001_create_sales_reps::SalesReps;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CommissionPayouts::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(CommissionPayouts::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(CommissionPayouts::RepId).integer().not_null())
          .col(
            ColumnDef::new(CommissionPayouts::BatchNumber)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(CommissionPayouts::PeriodStart)
              .date_time()
              .not_null(),
          )
          .col(
            ColumnDef::new(CommissionPayouts::PeriodEnd).date_time().not_null(),
          )
          .col(
            ColumnDef::new(CommissionPayouts::TotalCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(CommissionPayouts::RecordCount)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(CommissionPayouts::Status)
              .string()
              .not_null()
              .default("calculated"),
          )
          .col(ColumnDef::new(CommissionPayouts::ApprovedBy).big_integer().null())
          .col(ColumnDef::new(CommissionPayouts::ApprovedAt).date_time().null())
          .col(ColumnDef::new(CommissionPayouts::ProcessedAt).date_time().null())
          .col(
            ColumnDef::new(CommissionPayouts::PaymentReference).string().null(),
          )
          .col(ColumnDef::new(CommissionPayouts::Notes).text().null())
          .col(
            ColumnDef::new(CommissionPayouts::CreatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_commission_payouts_rep")
              .from(CommissionPayouts::Table, CommissionPayouts::RepId)
              .to(SalesReps::Table, SalesReps::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_payouts_rep_status")
          .table(CommissionPayouts::Table)
          .col(CommissionPayouts::RepId)
          .col(CommissionPayouts::Status)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_payouts_period")
          .table(CommissionPayouts::Table)
          .col(CommissionPayouts::PeriodStart)
          .col(CommissionPayouts::PeriodEnd)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CommissionPayouts::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CommissionPayouts {
  Table,
  Id,
  RepId,
  BatchNumber,
  PeriodStart,
  PeriodEnd,
  TotalCents,
  RecordCount,
  Status,
  ApprovedBy,
  ApprovedAt,
  ProcessedAt,
  PaymentReference,
  Notes,
  CreatedAt,
}
