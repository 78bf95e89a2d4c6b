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
                    .as_enum(PaymentStatus::Enum)
                    .values([
                        PaymentStatus::Pending,
                        PaymentStatus::Paid,
                        PaymentStatus::Failed,
                        PaymentStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payment::Table)
                    .if_not_exists()
                    .col(uuid(Payment::Id).primary_key())
                    .col(uuid(Payment::BookingId).not_null())
                    .col(uuid(Payment::UserId).not_null())
                    .col(
                        string_len(Payment::BillplzBillId, 255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len(Payment::BillplzUrl, 255).not_null())
                    .col(decimal_len(Payment::Amount, 10, 2).not_null())
                    .col(
                        ColumnDef::new(Payment::Status)
                            .custom(PaymentStatus::Enum)
                            .not_null(),
                    )
                    .col(string_null(Payment::PaymentMethod))
                    .col(timestamp_with_time_zone_null(Payment::PaidAt))
                    .col(json_binary_null(Payment::BillplzResponse))
                    .col(
                        timestamp_with_time_zone(Payment::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_booking")
                            .from(Payment::Table, Payment::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_user")
                            .from(Payment::Table, Payment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payment::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(PaymentStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Payment {
    Table,
    Id,
    BookingId,
    UserId,
    BillplzBillId,
    BillplzUrl,
    Amount,
    Status,
    PaymentMethod,
    PaidAt,
    BillplzResponse,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum PaymentStatus {
    #[sea_orm(iden = "payment_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "paid")]
    Paid,
    #[sea_orm(iden = "failed")]
    Failed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}
