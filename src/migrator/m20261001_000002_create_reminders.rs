use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reminders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reminders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Reminders::PlantId).uuid().not_null())
                    .col(
                        ColumnDef::new(Reminders::ReminderType)
                            .string()
                            .not_null()
                            .default("other"),
                    )
                    .col(ColumnDef::new(Reminders::Title).string())
                    .col(ColumnDef::new(Reminders::Description).text())
                    .col(
                        ColumnDef::new(Reminders::ScheduledFor)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reminders::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Reminders::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reminders::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Reminders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reminders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reminders_plant")
                            .from(Reminders::Table, Reminders::PlantId)
                            .to(Plants::Table, Plants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The live query filters on (is_deleted, is_completed) and orders by due date.
        manager
            .create_index(
                Index::create()
                    .name("idx_reminders_active_due")
                    .table(Reminders::Table)
                    .col(Reminders::IsDeleted)
                    .col(Reminders::IsCompleted)
                    .col(Reminders::ScheduledFor)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reminders_plant_id")
                    .table(Reminders::Table)
                    .col(Reminders::PlantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reminders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Reminders {
    Table,
    Id,
    PlantId,
    ReminderType,
    Title,
    Description,
    ScheduledFor,
    IsCompleted,
    IsDeleted,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Plants {
    Table,
    Id,
}
