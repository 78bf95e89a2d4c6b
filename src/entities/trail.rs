use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "difficulty_level")]
pub enum DifficultyLevel {
    #[sea_orm(string_value = "easy")]
    Easy,
    #[sea_orm(string_value = "moderate")]
    Moderate,
    #[sea_orm(string_value = "hard")]
    Hard,
    #[sea_orm(string_value = "extreme")]
    Extreme,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trail")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub mount_id: i32,
    pub name: String,
    pub description: String,
    pub difficulty_level: DifficultyLevel,
    pub distance_km: Decimal,
    pub estimated_hours: i32,
    pub waypoints: Option<Json>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mount::Entity",
        from = "Column::MountId",
        to = "super::mount::Column::Id"
    )]
    Mount,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::mount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mount.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
