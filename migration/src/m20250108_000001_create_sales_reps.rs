use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(SalesReps::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(SalesReps::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(SalesReps::Name).string().not_null())
          .col(ColumnDef::new(SalesReps::Email).string().null())
          .col(ColumnDef::new(SalesReps::Territory).string().null())
          .col(
            ColumnDef::new(SalesReps::CommissionRateDirectBp)
              .integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(SalesReps::ParentShareBp)
              .integer()
              .not_null()
              .default(5000),
          )
          .col(ColumnDef::new(SalesReps::ParentRepId).integer().null())
          .col(
            ColumnDef::new(SalesReps::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(SalesReps::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_sales_reps_parent")
              .from(SalesReps::Table, SalesReps::ParentRepId)
              .to(SalesReps::Table, SalesReps::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sales_reps_parent")
          .table(SalesReps::Table)
          .col(SalesReps::ParentRepId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sales_reps_active")
          .table(SalesReps::Table)
          .col(SalesReps::IsActive)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(SalesReps::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum SalesReps {
  Table,
  Id,
  Name,
  Email,
  Territory,
  CommissionRateDirectBp,
  ParentShareBp,
  ParentRepId,
  IsActive,
  CreatedAt,
}
