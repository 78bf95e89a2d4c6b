use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "booking_status")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub group_code: String,
    pub mount_id: i32,
    pub trail_id: i32,
    pub guide_id: Uuid,
    pub created_by: Uuid,
    pub booking_date: Date,
    pub start_time: Time,
    pub max_participants: i32,
    pub current_participants: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn has_spare_capacity(&self) -> bool {
        self.current_participants < self.max_participants
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mount::Entity",
        from = "Column::MountId",
        to = "super::mount::Column::Id"
    )]
    Mount,
    #[sea_orm(
        belongs_to = "super::trail::Entity",
        from = "Column::TrailId",
        to = "super::trail::Column::Id"
    )]
    Trail,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::GuideId",
        to = "super::user::Column::Id"
    )]
    Guide,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(has_many = "super::booking_user::Entity")]
    BookingUsers,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::mount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mount.def()
    }
}

impl Related<super::trail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trail.def()
    }
}

impl Related<super::booking_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingUsers.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
