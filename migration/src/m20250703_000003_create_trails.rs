use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250703_000002_create_mounts::Mount;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(DifficultyLevel::Enum)
                    .values([
                        DifficultyLevel::Easy,
                        DifficultyLevel::Moderate,
                        DifficultyLevel::Hard,
                        DifficultyLevel::Extreme,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trail::Table)
                    .if_not_exists()
                    .col(pk_auto(Trail::Id))
                    .col(integer(Trail::MountId).not_null())
                    .col(string_len(Trail::Name, 255).not_null())
                    .col(text(Trail::Description).not_null())
                    .col(
                        ColumnDef::new(Trail::DifficultyLevel)
                            .custom(DifficultyLevel::Enum)
                            .not_null(),
                    )
                    .col(decimal_len(Trail::DistanceKm, 8, 2).not_null())
                    .col(integer(Trail::EstimatedHours).not_null())
                    .col(json_binary_null(Trail::Waypoints))
                    .col(boolean(Trail::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Trail::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trail_mount")
                            .from(Trail::Table, Trail::MountId)
                            .to(Mount::Table, Mount::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Trail::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(DifficultyLevel::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Trail {
    Table,
    Id,
    MountId,
    Name,
    Description,
    DifficultyLevel,
    DistanceKm,
    EstimatedHours,
    Waypoints,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum DifficultyLevel {
    #[sea_orm(iden = "difficulty_level")]
    Enum,
    #[sea_orm(iden = "easy")]
    Easy,
    #[sea_orm(iden = "moderate")]
    Moderate,
    #[sea_orm(iden = "hard")]
    Hard,
    #[sea_orm(iden = "extreme")]
    Extreme,
}
