use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
pub enum UserRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "guide")]
    Guide,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "super_admin")]
    SuperAdmin,
}

const USER_CAPABILITIES: &[&str] = &[
    "make_booking",
    "update_profile",
    "cancel_own_booking",
    "view_own_bookings",
    "rate_guide",
    "write_reviews",
];

const GUIDE_CAPABILITIES: &[&str] = &[
    "edit_own_tours",
    "delete_own_tours",
    "manage_own_bookings",
    "update_tour_status",
];

const ADMIN_CAPABILITIES: &[&str] = &[
    "manage_users",
    "view_all_users",
    "manage_guides",
    "approve_guides",
    "manage_all_tours",
    "view_all_bookings",
    "moderate_reviews",
    "view_analytics",
    "manage_system_settings",
];

const SUPER_ADMIN_CAPABILITIES: &[&str] = &[
    "manage_admins",
    "delete_any_data",
    "system_configuration",
    "backup_restore",
    "access_logs",
];

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Guide => "guide",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    /// Fixed capability catalog assigned at role level. Higher roles
    /// inherit everything below them.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps: Vec<&'static str> = Vec::new();
        match self {
            UserRole::User => caps.extend(USER_CAPABILITIES),
            UserRole::Guide => {
                caps.extend(USER_CAPABILITIES);
                caps.extend(GUIDE_CAPABILITIES);
            }
            UserRole::Admin => {
                caps.extend(USER_CAPABILITIES);
                caps.extend(GUIDE_CAPABILITIES);
                caps.extend(ADMIN_CAPABILITIES);
            }
            UserRole::SuperAdmin => {
                caps.extend(USER_CAPABILITIES);
                caps.extend(GUIDE_CAPABILITIES);
                caps.extend(ADMIN_CAPABILITIES);
                caps.extend(SUPER_ADMIN_CAPABILITIES);
            }
        }
        caps
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub certifications: Option<Json>,
    pub specialties: Option<Json>,
    pub rating: Option<Decimal>,
    pub is_available: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking_user::Entity")]
    BookingUsers,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_role_capabilities() {
        assert!(UserRole::User.has_capability("make_booking"));
        assert!(!UserRole::User.has_capability("edit_own_tours"));
        assert!(!UserRole::User.has_capability("manage_users"));
    }

    #[test]
    fn guide_inherits_user_capabilities() {
        assert!(UserRole::Guide.has_capability("edit_own_tours"));
        assert!(UserRole::Guide.has_capability("make_booking"));
        assert!(!UserRole::Guide.has_capability("manage_users"));
    }

    #[test]
    fn super_admin_has_everything() {
        for cap in UserRole::Admin.capabilities() {
            assert!(UserRole::SuperAdmin.has_capability(cap));
        }
        assert!(UserRole::SuperAdmin.has_capability("system_configuration"));
        assert!(!UserRole::Admin.has_capability("system_configuration"));
    }

    #[test]
    fn admin_privilege_check() {
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::SuperAdmin.is_admin());
        assert!(!UserRole::Guide.is_admin());
        assert!(!UserRole::User.is_admin());
    }
}
