use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CommissionRules::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(CommissionRules::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(CommissionRules::TargetType).string().not_null())
          .col(
            ColumnDef::new(CommissionRules::TargetId).big_integer().not_null(),
          )
          .col(ColumnDef::new(CommissionRules::RateBp).integer().not_null())
          .col(
            ColumnDef::new(CommissionRules::ValidFrom).date_time().not_null(),
          )
          .col(ColumnDef::new(CommissionRules::ValidTo).date_time().null())
          .col(
            ColumnDef::new(CommissionRules::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(CommissionRules::Description).text().null())
          .col(
            ColumnDef::new(CommissionRules::CreatedAt).date_time().not_null(),
          )
          .col(ColumnDef::new(CommissionRules::DeletedAt).date_time().null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_rules_target")
          .table(CommissionRules::Table)
          .col(CommissionRules::TargetType)
          .col(CommissionRules::TargetId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commission_rules_valid_from")
          .table(CommissionRules::Table)
          .col(CommissionRules::ValidFrom)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CommissionRules::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CommissionRules {
  Table,
  Id,
  TargetType,
  TargetId,
  RateBp,
  ValidFrom,
  ValidTo,
  IsActive,
  Description,
  CreatedAt,
  DeletedAt,
}
