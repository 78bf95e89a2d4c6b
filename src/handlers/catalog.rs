use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::user::{self, UserRole};
use crate::entities::{mount, trail};
use crate::error::{AppError, AppResult};
use crate::handlers::admin::GuideProfile;
use crate::response::ApiResponse;
use crate::AppState;

/// Active mounts
pub async fn list_mounts(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<mount::Model>>>> {
    let mounts = mount::Entity::find()
        .filter(mount::Column::IsActive.eq(true))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok("Mounts retrieved successfully", mounts)))
}

#[derive(Debug, Serialize)]
pub struct MountDetail {
    #[serde(flatten)]
    pub mount: mount::Model,
    pub trails: Vec<trail::Model>,
}

/// One mount with its active trails
pub async fn show_mount(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<MountDetail>>> {
    let mount = mount::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Mount not found".to_string()))?;

    let trails = trail::Entity::find()
        .filter(trail::Column::MountId.eq(mount.id))
        .filter(trail::Column::IsActive.eq(true))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Mount retrieved successfully",
        MountDetail { mount, trails },
    )))
}

/// Active trails of a mount
pub async fn list_mount_trails(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Vec<trail::Model>>>> {
    let mount = mount::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Mount not found".to_string()))?;

    let trails = trail::Entity::find()
        .filter(trail::Column::MountId.eq(mount.id))
        .filter(trail::Column::IsActive.eq(true))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok("Trails retrieved successfully", trails)))
}

#[derive(Debug, Deserialize)]
pub struct GuideQuery {
    pub date: Option<String>,
}

/// Guides open for assignment. With `?date=YYYY-MM-DD`, only guides free on
/// that date (not already leading a confirmed booking).
pub async fn list_guides(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GuideQuery>,
) -> AppResult<Json<ApiResponse<Vec<GuideProfile>>>> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::validation_field("date", "The date is not a valid date")
        })?),
        None => None,
    };

    let guides = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Guide))
        .filter(user::Column::IsAvailable.eq(true))
        .all(&state.db)
        .await?;

    let guides = match date {
        Some(date) => {
            let guide_ids: Vec<Uuid> = guides.iter().map(|g| g.id).collect();
            let busy: Vec<Uuid> = booking::Entity::find()
                .filter(booking::Column::GuideId.is_in(guide_ids))
                .filter(booking::Column::BookingDate.eq(date))
                .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
                .all(&state.db)
                .await?
                .into_iter()
                .map(|b| b.guide_id)
                .collect();

            guides
                .into_iter()
                .filter(|g| !busy.contains(&g.id))
                .collect()
        }
        None => guides,
    };

    let data = guides.into_iter().map(GuideProfile::from).collect();

    Ok(Json(ApiResponse::ok("Guides retrieved successfully", data)))
}
