use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mount::Table)
                    .if_not_exists()
                    .col(pk_auto(Mount::Id))
                    .col(string_len(Mount::Name, 255).not_null())
                    .col(text(Mount::Description).not_null())
                    .col(decimal_len(Mount::Price, 10, 2).not_null())
                    .col(integer(Mount::MaxParticipants).not_null())
                    .col(string_len(Mount::Location, 255).not_null())
                    .col(decimal_len(Mount::Altitude, 10, 2).not_null())
                    .col(integer(Mount::DurationDays).not_null())
                    .col(json_binary_null(Mount::Images))
                    .col(boolean(Mount::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Mount::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mount::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Mount {
    Table,
    Id,
    Name,
    Description,
    Price,
    MaxParticipants,
    Location,
    Altitude,
    DurationDays,
    Images,
    IsActive,
    CreatedAt,
}
