pub use sea_orm_migration::prelude::*;

mod m20250703_000001_create_users;
mod m20250703_000002_create_mounts;
mod m20250703_000003_create_trails;
mod m20250703_000004_create_bookings;
mod m20250703_000005_create_booking_users;
mod m20250703_000006_create_payments;
mod m20250703_000007_create_revoked_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250703_000001_create_users::Migration),
            Box::new(m20250703_000002_create_mounts::Migration),
            Box::new(m20250703_000003_create_trails::Migration),
            Box::new(m20250703_000004_create_bookings::Migration),
            Box::new(m20250703_000005_create_booking_users::Migration),
            Box::new(m20250703_000006_create_payments::Migration),
            Box::new(m20250703_000007_create_revoked_tokens::Migration),
        ]
    }
}
