use sea_orm_migration::prelude::*;

use super::{
  m20250108_000001_create_sales_reps::SalesReps,
  m20250108_000003_create_commission_payouts::CommissionPayouts,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CommissionRecords::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(CommissionRecords::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(CommissionRecords::OrderId).big_integer().not_null(),
          )
          .col(
            ColumnDef::new(CommissionRecords::OrderItemId)
              .big_integer()
              .not_null(),
          )
          .col(ColumnDef::new(CommissionRecords::RepId).integer().not_null())
          .col(ColumnDef::new(CommissionRecords::ParentRepId).integer().null())
          .col(
            ColumnDef::new(CommissionRecords::AmountCents)
              .big_integer()
              .not_null(),
          )
          .col(ColumnDef::new(CommissionRecords::RateBp).integer().not_null())
          .col(ColumnDef::new(CommissionRecords::Kind).string().not_null())
          .col(
            ColumnDef::new(CommissionRecords::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(
            ColumnDef::new(CommissionRecords::CalculationDate)
              .date_time()
              .not_null(),
          )
          .col(ColumnDef::new(CommissionRecords::PayoutId).integer().null())
          .col(ColumnDef::new(CommissionRecords::ApprovedBy).big_integer().null())
          .col(ColumnDef::new(CommissionRecords::ApprovedAt).date_time().null())
          .col(ColumnDef::new(CommissionRecords::PaidAt).date_time().null())
          .col(ColumnDef::new(CommissionRecords::ReversesId).integer().null())
          .col(ColumnDef::new(CommissionRecords::Notes).text().null())
          .col(
            ColumnDef::new(CommissionRecords::CreatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_commission_records_rep")
              .from(CommissionRecords::Table, CommissionRecords::RepId)
              .to(SalesReps::Table, SalesReps::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_commission_records_parent_rep")
              .from(CommissionRecords::Table, CommissionRecords::ParentRepId)
              .to(SalesReps::Table, SalesReps::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_commission_records_payout")
              .from(CommissionRecords::Table, CommissionRecords::PayoutId)
              .to(CommissionPayouts::Table, CommissionPayouts::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    // One commission line per (order item, recipient, kind).
    manager
      .create_index(
        Index::create()
          .name("uq_commission_records_item_rep_kind")
          .table(CommissionRecords::Table)
          .col(CommissionRecords::OrderItemId)
          .col(CommissionRecords::RepId)
          .col(CommissionRecords::Kind)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_records_rep_status")
          .table(CommissionRecords::Table)
          .col(CommissionRecords::RepId)
          .col(CommissionRecords::Status)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_records_payout")
          .table(CommissionRecords::Table)
          .col(CommissionRecords::PayoutId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CommissionRecords::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CommissionRecords {
  Table,
  Id,
  OrderId,
  OrderItemId,
  RepId,
  ParentRepId,
  AmountCents,
  RateBp,
  Kind,
  Status,
  CalculationDate,
  PayoutId,
  ApprovedBy,
  ApprovedAt,
  PaidAt,
  ReversesId,
  Notes,
  CreatedAt,
}
