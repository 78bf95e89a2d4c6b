use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::trail::{self, DifficultyLevel};
use crate::entities::user::{self, UserRole};
use crate::entities::{booking, mount};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::{hash_password, UserInfo};
use crate::response::ApiResponse;
use crate::utils::jwt::Claims;
use crate::utils::validation::{is_valid_email, Validator};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ManagedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for ManagedUser {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role.as_str(),
            is_available: u.is_available,
            created_at: u.created_at.with_timezone(&Utc),
        }
    }
}

/// All accounts, for the admin dashboard
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ManagedUser>>>> {
    let users = user::Entity::find().all(&state.db).await?;
    let data = users.into_iter().map(ManagedUser::from).collect();

    Ok(Json(ApiResponse::ok("Users retrieved successfully", data)))
}

#[derive(Debug, Serialize)]
pub struct GuideProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub certifications: Option<serde_json::Value>,
    pub specialties: Option<serde_json::Value>,
    pub rating: Option<Decimal>,
    pub is_available: bool,
}

impl From<user::Model> for GuideProfile {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            bio: u.bio,
            experience_years: u.experience_years,
            certifications: u.certifications,
            specialties: u.specialties,
            rating: u.rating,
            is_available: u.is_available,
        }
    }
}

/// Guide accounts with their full profiles
pub async fn list_guides(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<GuideProfile>>>> {
    let guides = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Guide))
        .all(&state.db)
        .await?;
    let data = guides.into_iter().map(GuideProfile::from).collect();

    Ok(Json(ApiResponse::ok("Guides retrieved successfully", data)))
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub users: u64,
    pub guides: u64,
    pub admins: u64,
    pub total_bookings: u64,
}

/// Account counts by role
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserStats>>> {
    let total_users = user::Entity::find().count(&state.db).await?;
    let users = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::User))
        .count(&state.db)
        .await?;
    let guides = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Guide))
        .count(&state.db)
        .await?;
    let admins = user::Entity::find()
        .filter(user::Column::Role.is_in([UserRole::Admin, UserRole::SuperAdmin]))
        .count(&state.db)
        .await?;
    let total_bookings = booking::Entity::find().count(&state.db).await?;

    Ok(Json(ApiResponse::ok(
        "Statistics retrieved successfully",
        UserStats {
            total_users,
            users,
            guides,
            admins,
            total_bookings,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Change a user's role. Admins may assign user/guide; granting admin takes
/// a super_admin caller, and super_admin itself is never assignable.
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<ManagedUser>>> {
    let new_role = match payload.role.as_str() {
        "user" => UserRole::User,
        "guide" => UserRole::Guide,
        "admin" => UserRole::Admin,
        _ => {
            return Err(AppError::validation_field(
                "role",
                "The selected role is invalid",
            ))
        }
    };

    if new_role == UserRole::Admin && claims.role != UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only super admin can assign the admin role".to_string(),
        ));
    }

    let target = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.role == UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Cannot modify a super admin account".to_string(),
        ));
    }

    let mut active: user::ActiveModel = target.into();
    active.role = Set(new_role);
    let updated = active.update(&state.db).await?;

    tracing::info!(user_id = %updated.id, role = updated.role.as_str(), "role updated");

    Ok(Json(ApiResponse::ok(
        "User role updated successfully",
        updated.into(),
    )))
}

/// Delete an account; super admins and the caller's own account are off limits
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    if id == claims.sub {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let target = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.role == UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Cannot delete a super admin account".to_string(),
        ));
    }

    user::Entity::delete_by_id(target.id).exec(&state.db).await?;

    Ok(Json(ApiResponse::message("User deleted successfully")))
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Create an admin account; super_admin only (enforced by the router)
pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAdminRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserInfo>>)> {
    let mut v = Validator::new();
    if payload.name.trim().is_empty() {
        v.add("name", "The name field is required");
    } else if payload.name.len() > 255 {
        v.add("name", "The name may not be greater than 255 characters");
    }
    if !is_valid_email(&payload.email) {
        v.add("email", "The email must be a valid email address");
    }
    if payload.password.len() < 8 {
        v.add("password", "The password must be at least 8 characters");
    }
    if payload.password != payload.password_confirmation {
        v.add("password", "The password confirmation does not match");
    }
    v.finish()?;

    let new_admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email.clone()),
        password_hash: Set(hash_password(&payload.password)?),
        name: Set(payload.name.trim().to_string()),
        role: Set(UserRole::Admin),
        ..Default::default()
    };

    let admin = match new_admin.insert(&state.db).await {
        Ok(admin) => admin,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::validation_field(
                "email",
                "The email has already been taken",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %admin.id, "admin account created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Admin created successfully",
            UserInfo::from_model(&admin),
        )),
    ))
}

// ============ Catalog management ============

#[derive(Debug, Deserialize)]
pub struct CreateMountRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub max_participants: i32,
    pub location: String,
    pub altitude: Decimal,
    pub duration_days: i32,
    pub images: Option<serde_json::Value>,
}

pub async fn create_mount(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateMountRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<mount::Model>>)> {
    let mut v = Validator::new();
    if payload.name.trim().is_empty() {
        v.add("name", "The name field is required");
    } else if payload.name.len() > 255 {
        v.add("name", "The name may not be greater than 255 characters");
    }
    if payload.location.trim().is_empty() {
        v.add("location", "The location field is required");
    }
    if payload.price < Decimal::ZERO {
        v.add("price", "The price must be at least 0");
    }
    if payload.max_participants < 1 {
        v.add("max_participants", "The max participants must be at least 1");
    }
    if payload.duration_days < 1 {
        v.add("duration_days", "The duration days must be at least 1");
    }
    v.finish()?;

    let new_mount = mount::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        max_participants: Set(payload.max_participants),
        location: Set(payload.location.trim().to_string()),
        altitude: Set(payload.altitude),
        duration_days: Set(payload.duration_days),
        images: Set(payload.images),
        is_active: Set(true),
        ..Default::default()
    };

    let mount = new_mount.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Mount created successfully", mount)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateTrailRequest {
    pub mount_id: i32,
    pub name: String,
    pub description: String,
    pub difficulty_level: String,
    pub distance_km: Decimal,
    pub estimated_hours: i32,
    pub waypoints: Option<serde_json::Value>,
}

pub async fn create_trail(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTrailRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<trail::Model>>)> {
    let mut v = Validator::new();
    if payload.name.trim().is_empty() {
        v.add("name", "The name field is required");
    }
    // Validation rejects the request below before the fallback can matter
    let difficulty = match payload.difficulty_level.as_str() {
        "easy" => DifficultyLevel::Easy,
        "moderate" => DifficultyLevel::Moderate,
        "hard" => DifficultyLevel::Hard,
        "extreme" => DifficultyLevel::Extreme,
        _ => {
            v.add("difficulty_level", "The selected difficulty level is invalid");
            DifficultyLevel::Easy
        }
    };
    if payload.distance_km < Decimal::ZERO {
        v.add("distance_km", "The distance must be at least 0");
    }
    if payload.estimated_hours < 1 {
        v.add("estimated_hours", "The estimated hours must be at least 1");
    }
    v.finish()?;

    let mount = mount::Entity::find_by_id(payload.mount_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::validation_field("mount_id", "The selected mount is invalid"))?;

    let new_trail = trail::ActiveModel {
        mount_id: Set(mount.id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        difficulty_level: Set(difficulty),
        distance_km: Set(payload.distance_km),
        estimated_hours: Set(payload.estimated_hours),
        waypoints: Set(payload.waypoints),
        is_active: Set(true),
        ..Default::default()
    };

    let trail = new_trail.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Trail created successfully", trail)),
    ))
}
