use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250703_000001_create_users::User;
use super::m20250703_000004_create_bookings::Booking;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(ParticipantStatus::Enum)
                    .values([
                        ParticipantStatus::Pending,
                        ParticipantStatus::Confirmed,
                        ParticipantStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookingUser::Table)
                    .if_not_exists()
                    .col(uuid(BookingUser::Id).primary_key())
                    .col(uuid(BookingUser::BookingId).not_null())
                    .col(uuid(BookingUser::UserId).not_null())
                    .col(boolean(BookingUser::IsCreator).not_null().default(false))
                    .col(
                        ColumnDef::new(BookingUser::Status)
                            .custom(ParticipantStatus::Enum)
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone(BookingUser::JoinedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user_booking")
                            .from(BookingUser::Table, BookingUser::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user_user")
                            .from(BookingUser::Table, BookingUser::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One roster row per (booking, user); guards concurrent double-join
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user_unique")
                    .table(BookingUser::Table)
                    .col(BookingUser::BookingId)
                    .col(BookingUser::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookingUser::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(ParticipantStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BookingUser {
    Table,
    Id,
    BookingId,
    UserId,
    IsCreator,
    Status,
    JoinedAt,
}

#[derive(DeriveIden)]
pub enum ParticipantStatus {
    #[sea_orm(iden = "participant_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}
