use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create user role enum
        manager
            .create_type(
                Type::create()
                    .as_enum(UserRole::Enum)
                    .values([
                        UserRole::User,
                        UserRole::Guide,
                        UserRole::Admin,
                        UserRole::SuperAdmin,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len(User::PasswordHash, 255).not_null())
                    .col(string_len(User::Name, 255).not_null())
                    .col(
                        ColumnDef::new(User::Role)
                            .custom(UserRole::Enum)
                            .not_null(),
                    )
                    // Guide profile fields, null for regular users
                    .col(string_null(User::Phone))
                    .col(text_null(User::Bio))
                    .col(integer_null(User::ExperienceYears))
                    .col(json_binary_null(User::Certifications))
                    .col(json_binary_null(User::Specialties))
                    .col(decimal_len_null(User::Rating, 3, 2))
                    .col(boolean(User::IsAvailable).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(UserRole::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    Role,
    Phone,
    Bio,
    ExperienceYears,
    Certifications,
    Specialties,
    Rating,
    IsAvailable,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum UserRole {
    #[sea_orm(iden = "user_role")]
    Enum,
    #[sea_orm(iden = "user")]
    User,
    #[sea_orm(iden = "guide")]
    Guide,
    #[sea_orm(iden = "admin")]
    Admin,
    #[sea_orm(iden = "super_admin")]
    SuperAdmin,
}
