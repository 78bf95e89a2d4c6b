use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250703_000001_create_users::User;
use super::m20250703_000002_create_mounts::Mount;
use super::m20250703_000003_create_trails::Trail;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(BookingStatus::Enum)
                    .values([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        BookingStatus::Cancelled,
                        BookingStatus::Completed,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    // Unique constraint is the final authority on code collisions
                    .col(string_len(Booking::GroupCode, 9).not_null().unique_key())
                    .col(integer(Booking::MountId).not_null())
                    .col(integer(Booking::TrailId).not_null())
                    .col(uuid(Booking::GuideId).not_null())
                    .col(uuid(Booking::CreatedBy).not_null())
                    .col(date(Booking::BookingDate).not_null())
                    .col(time(Booking::StartTime).not_null())
                    .col(integer(Booking::MaxParticipants).not_null())
                    .col(integer(Booking::CurrentParticipants).not_null().default(1))
                    .col(decimal_len(Booking::TotalPrice, 10, 2).not_null())
                    .col(
                        ColumnDef::new(Booking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null(),
                    )
                    .col(text_null(Booking::Notes))
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_mount")
                            .from(Booking::Table, Booking::MountId)
                            .to(Mount::Table, Mount::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_trail")
                            .from(Booking::Table, Booking::TrailId)
                            .to(Trail::Table, Trail::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_guide")
                            .from(Booking::Table, Booking::GuideId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_creator")
                            .from(Booking::Table, Booking::CreatedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BookingStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    GroupCode,
    MountId,
    TrailId,
    GuideId,
    CreatedBy,
    BookingDate,
    StartTime,
    MaxParticipants,
    CurrentParticipants,
    TotalPrice,
    Status,
    Notes,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
    #[sea_orm(iden = "completed")]
    Completed,
}
