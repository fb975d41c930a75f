use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Plants::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Plants::Name).string().not_null())
                    .col(ColumnDef::new(Plants::Strain).string())
                    .col(ColumnDef::new(Plants::ImageUrl).text())
                    .col(
                        ColumnDef::new(Plants::HealthPercentage)
                            .integer()
                            .not_null()
                            .default(100),
                    )
                    .col(
                        ColumnDef::new(Plants::NextWateringDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Plants::NextNutrientDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Plants::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Plants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Plants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Plants {
    Table,
    Id,
    Name,
    Strain,
    ImageUrl,
    HealthPercentage,
    NextWateringDays,
    NextNutrientDays,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}
