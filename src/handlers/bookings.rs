use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::booking_user::{self, ParticipantStatus};
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::trail::DifficultyLevel;
use crate::entities::user::{self, UserRole};
use crate::entities::{mount, trail};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::utils::group_code;
use crate::utils::jwt::Claims;
use crate::utils::validation::Validator;
use crate::AppState;

/// Attempts before giving up on group code generation. A single retry is
/// already astronomically unlikely with 26^8 codes.
const GROUP_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize)]
pub struct BookingData {
    pub id: Uuid,
    pub group_code: String,
    pub mount_id: i32,
    pub mount_name: String,
    pub trail_id: i32,
    pub trail_name: String,
    pub difficulty_level: Option<DifficultyLevel>,
    pub guide_id: Uuid,
    pub guide_name: String,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub max_participants: i32,
    pub current_participants: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingData {
    fn assemble(
        b: booking::Model,
        mounts: &[mount::Model],
        trails: &[trail::Model],
        guides: &[user::Model],
    ) -> Self {
        let mount = mounts.iter().find(|m| m.id == b.mount_id);
        let trail = trails.iter().find(|t| t.id == b.trail_id);
        let guide = guides.iter().find(|g| g.id == b.guide_id);

        Self {
            id: b.id,
            group_code: b.group_code,
            mount_id: b.mount_id,
            mount_name: mount.map(|m| m.name.clone()).unwrap_or_default(),
            trail_id: b.trail_id,
            trail_name: trail.map(|t| t.name.clone()).unwrap_or_default(),
            difficulty_level: trail.map(|t| t.difficulty_level.clone()),
            guide_id: b.guide_id,
            guide_name: guide.map(|g| g.name.clone()).unwrap_or_default(),
            booking_date: b.booking_date,
            start_time: b.start_time,
            max_participants: b.max_participants,
            current_participants: b.current_participants,
            total_price: b.total_price,
            status: b.status,
            notes: b.notes,
            created_at: b.created_at.with_timezone(&Utc),
        }
    }
}

async fn load_booking_data(
    db: &DatabaseConnection,
    b: booking::Model,
) -> AppResult<BookingData> {
    let mounts = mount::Entity::find()
        .filter(mount::Column::Id.eq(b.mount_id))
        .all(db)
        .await?;
    let trails = trail::Entity::find()
        .filter(trail::Column::Id.eq(b.trail_id))
        .all(db)
        .await?;
    let guides = user::Entity::find()
        .filter(user::Column::Id.eq(b.guide_id))
        .all(db)
        .await?;

    Ok(BookingData::assemble(b, &mounts, &trails, &guides))
}

async fn find_participant(
    db: &DatabaseConnection,
    booking_id: Uuid,
    user_id: Uuid,
) -> AppResult<Option<booking_user::Model>> {
    Ok(booking_user::Entity::find()
        .filter(booking_user::Column::BookingId.eq(booking_id))
        .filter(booking_user::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// A guide is available on a date when flagged available and not already
/// leading a confirmed booking that day
async fn guide_is_available(
    db: &DatabaseConnection,
    guide: &user::Model,
    date: NaiveDate,
) -> AppResult<bool> {
    if !guide.is_available {
        return Ok(false);
    }

    let confirmed = booking::Entity::find()
        .filter(booking::Column::GuideId.eq(guide.id))
        .filter(booking::Column::BookingDate.eq(date))
        .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
        .one(db)
        .await?;

    Ok(confirmed.is_none())
}

// ============ Listing ============

/// List the caller's bookings (as creator or joined participant)
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<Vec<BookingData>>>> {
    let memberships = booking_user::Entity::find()
        .filter(booking_user::Column::UserId.eq(claims.sub))
        .all(&state.db)
        .await?;

    let booking_ids: Vec<Uuid> = memberships.iter().map(|m| m.booking_id).collect();
    let bookings = booking::Entity::find()
        .filter(booking::Column::Id.is_in(booking_ids))
        .all(&state.db)
        .await?;

    let mounts = mount::Entity::find().all(&state.db).await?;
    let trails = trail::Entity::find().all(&state.db).await?;
    let guide_ids: Vec<Uuid> = bookings.iter().map(|b| b.guide_id).collect();
    let guides = user::Entity::find()
        .filter(user::Column::Id.is_in(guide_ids))
        .all(&state.db)
        .await?;

    let data = bookings
        .into_iter()
        .map(|b| BookingData::assemble(b, &mounts, &trails, &guides))
        .collect();

    Ok(Json(ApiResponse::ok("Bookings retrieved successfully", data)))
}

// ============ Creation ============

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub mount_id: i32,
    pub trail_id: i32,
    pub guide_id: Uuid,
    pub booking_date: String,
    pub start_time: String,
    pub max_participants: i32,
    pub notes: Option<String>,
}

fn validate_booking_fields(
    date: &str,
    time: &str,
    max_participants: i32,
    notes: Option<&str>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveTime)> {
    let mut v = Validator::new();

    let parsed_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
    match parsed_date {
        None => v.add("booking_date", "The booking date is not a valid date"),
        Some(d) if d <= today => {
            v.add("booking_date", "The booking date must be a date after today")
        }
        Some(_) => {}
    }

    let parsed_time = NaiveTime::parse_from_str(time, "%H:%M").ok();
    if parsed_time.is_none() {
        v.add("start_time", "The start time does not match the format H:i");
    }

    if !(1..=20).contains(&max_participants) {
        v.add("max_participants", "The max participants must be between 1 and 20");
    }

    if notes.is_some_and(|n| n.len() > 1000) {
        v.add("notes", "The notes may not be greater than 1000 characters");
    }

    v.finish()?;

    let (Some(date), Some(time)) = (parsed_date, parsed_time) else {
        // Unreachable: a missing parse always puts an entry in the validator
        return Err(AppError::validation_field(
            "booking_date",
            "The booking date is not a valid date",
        ));
    };
    Ok((date, time))
}

#[derive(Debug, Serialize)]
pub struct CreatedBooking {
    pub booking: BookingData,
    pub group_code: String,
}

/// Create a booking and attach the creator as the first participant,
/// atomically
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedBooking>>)> {
    let today = Utc::now().date_naive();
    let (booking_date, start_time) = validate_booking_fields(
        &payload.booking_date,
        &payload.start_time,
        payload.max_participants,
        payload.notes.as_deref(),
        today,
    )?;

    let mount = mount::Entity::find_by_id(payload.mount_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::validation_field("mount_id", "The selected mount is invalid"))?;

    let trail = trail::Entity::find_by_id(payload.trail_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::validation_field("trail_id", "The selected trail is invalid"))?;

    let guide = user::Entity::find_by_id(payload.guide_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::validation_field("guide_id", "The selected guide is invalid"))?;

    if guide.role != UserRole::Guide {
        return Err(AppError::BadRequest(
            "Selected user is not a guide".to_string(),
        ));
    }

    if !guide_is_available(&state.db, &guide, booking_date).await? {
        return Err(AppError::BadRequest(
            "Guide is not available on the selected date".to_string(),
        ));
    }

    // The generate-and-insert loop relies on the unique constraint to stay
    // race-safe under concurrent creations; a collision rolls back both
    // inserts and redraws the code.
    let mut last_err: Option<AppError> = None;
    for _ in 0..GROUP_CODE_ATTEMPTS {
        let code = group_code::generate();

        let txn = state.db.begin().await?;

        let new_booking = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            group_code: Set(code.clone()),
            mount_id: Set(mount.id),
            trail_id: Set(trail.id),
            guide_id: Set(guide.id),
            created_by: Set(claims.sub),
            booking_date: Set(booking_date),
            start_time: Set(start_time),
            max_participants: Set(payload.max_participants),
            current_participants: Set(1),
            total_price: Set(mount.price),
            status: Set(BookingStatus::Pending),
            notes: Set(payload.notes.clone()),
            ..Default::default()
        };

        let inserted = match new_booking.insert(&txn).await {
            Ok(b) => b,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                last_err = Some(e.into());
                continue;
            }
            Err(e) => {
                txn.rollback().await?;
                return Err(e.into());
            }
        };

        let creator_row = booking_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(inserted.id),
            user_id: Set(claims.sub),
            is_creator: Set(true),
            status: Set(ParticipantStatus::Confirmed),
            joined_at: Set(Utc::now().into()),
        };

        if let Err(e) = creator_row.insert(&txn).await {
            txn.rollback().await?;
            return Err(e.into());
        }

        txn.commit().await?;

        tracing::info!(booking_id = %inserted.id, group_code = %code, "booking created");

        let data = load_booking_data(&state.db, inserted).await?;
        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::ok(
                "Booking created successfully",
                CreatedBooking {
                    group_code: data.group_code.clone(),
                    booking: data,
                },
            )),
        ));
    }

    Err(last_err
        .unwrap_or_else(|| AppError::Internal("Failed to allocate a group code".to_string())))
}

// ============ Detail / update / cancel ============

#[derive(Debug, Serialize)]
pub struct ParticipantInfo {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub is_creator: bool,
    pub status: ParticipantStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PaymentInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: BookingData,
    pub participants: Vec<ParticipantInfo>,
    pub payments: Vec<PaymentInfo>,
}

/// Booking detail with roster and payments; participants only
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let booking = booking::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if find_participant(&state.db, booking.id, claims.sub).await?.is_none() {
        return Err(AppError::Forbidden(
            "You are not authorized to view this booking".to_string(),
        ));
    }

    let roster = booking_user::Entity::find()
        .filter(booking_user::Column::BookingId.eq(booking.id))
        .all(&state.db)
        .await?;

    let member_ids: Vec<Uuid> = roster.iter().map(|r| r.user_id).collect();
    let members = user::Entity::find()
        .filter(user::Column::Id.is_in(member_ids))
        .all(&state.db)
        .await?;

    let participants = roster
        .into_iter()
        .map(|r| {
            let member = members.iter().find(|m| m.id == r.user_id);
            ParticipantInfo {
                user_id: r.user_id,
                name: member.map(|m| m.name.clone()).unwrap_or_default(),
                email: member.map(|m| m.email.clone()).unwrap_or_default(),
                is_creator: r.is_creator,
                status: r.status,
                joined_at: r.joined_at.with_timezone(&Utc),
            }
        })
        .collect();

    let payments = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| PaymentInfo {
            id: p.id,
            user_id: p.user_id,
            amount: p.amount,
            status: p.status,
            paid_at: p.paid_at.map(|t| t.with_timezone(&Utc)),
        })
        .collect();

    let data = load_booking_data(&state.db, booking).await?;

    Ok(Json(ApiResponse::ok(
        "Booking retrieved successfully",
        BookingDetail {
            booking: data,
            participants,
            payments,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub booking_date: Option<String>,
    pub start_time: Option<String>,
    pub max_participants: Option<i32>,
    pub notes: Option<String>,
}

/// Update date/time/capacity/notes; creator only
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingRequest>,
) -> AppResult<Json<ApiResponse<BookingData>>> {
    let booking = booking::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.created_by != claims.sub {
        return Err(AppError::Forbidden(
            "You are not authorized to update this booking".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let mut v = Validator::new();

    let new_date = match payload.booking_date.as_deref() {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) if d > today => Some(d),
            Ok(_) => {
                v.add("booking_date", "The booking date must be a date after today");
                None
            }
            Err(_) => {
                v.add("booking_date", "The booking date is not a valid date");
                None
            }
        },
        None => None,
    };

    let new_time = match payload.start_time.as_deref() {
        Some(raw) => match NaiveTime::parse_from_str(raw, "%H:%M") {
            Ok(t) => Some(t),
            Err(_) => {
                v.add("start_time", "The start time does not match the format H:i");
                None
            }
        },
        None => None,
    };

    if let Some(max) = payload.max_participants {
        // Capacity can never drop below the people already in the group
        if max < booking.current_participants {
            v.add(
                "max_participants",
                "The max participants may not be less than the current participants",
            );
        } else if max > 20 {
            v.add("max_participants", "The max participants must be between 1 and 20");
        }
    }

    if payload.notes.as_deref().is_some_and(|n| n.len() > 1000) {
        v.add("notes", "The notes may not be greater than 1000 characters");
    }

    v.finish()?;

    let mut active: booking::ActiveModel = booking.into();
    if let Some(d) = new_date {
        active.booking_date = Set(d);
    }
    if let Some(t) = new_time {
        active.start_time = Set(t);
    }
    if let Some(max) = payload.max_participants {
        active.max_participants = Set(max);
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }

    let updated = active.update(&state.db).await?;
    let data = load_booking_data(&state.db, updated).await?;

    Ok(Json(ApiResponse::ok("Booking updated successfully", data)))
}

/// Soft-cancel a booking; creator only. The row is kept so the roster and
/// payment history stay reachable.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let booking = booking::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.created_by != claims.sub {
        return Err(AppError::Forbidden(
            "You are not authorized to cancel this booking".to_string(),
        ));
    }

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Cancelled);
    active.update(&state.db).await?;

    Ok(Json(ApiResponse::message("Booking cancelled successfully")))
}

// ============ Group membership ============

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_code: String,
}

/// Join a booking group by its shared code
pub async fn join_group(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinGroupRequest>,
) -> AppResult<Json<ApiResponse<BookingData>>> {
    if !group_code::is_valid(&payload.group_code) {
        return Err(AppError::validation_field(
            "group_code",
            "The group code must match the format XXXX-XXXX",
        ));
    }

    let booking = booking::Entity::find()
        .filter(booking::Column::GroupCode.eq(&payload.group_code))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid group code".to_string()))?;

    if find_participant(&state.db, booking.id, claims.sub).await?.is_some() {
        return Err(AppError::BadRequest(
            "You are already part of this group".to_string(),
        ));
    }

    if !booking.has_spare_capacity() {
        return Err(AppError::BadRequest(
            "This group is already full".to_string(),
        ));
    }

    // Roster insert and counter increment commit together. The conditional
    // increment is the authority on capacity: two joins racing at max-1
    // cannot both pass the `current < max` filter.
    let txn = state.db.begin().await?;

    let member = booking_user::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        user_id: Set(claims.sub),
        is_creator: Set(false),
        status: Set(ParticipantStatus::Pending),
        joined_at: Set(Utc::now().into()),
    };

    if let Err(e) = member.insert(&txn).await {
        txn.rollback().await?;
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return Err(AppError::BadRequest(
                "You are already part of this group".to_string(),
            ));
        }
        return Err(e.into());
    }

    let result = booking::Entity::update_many()
        .col_expr(
            booking::Column::CurrentParticipants,
            Expr::col(booking::Column::CurrentParticipants).add(1),
        )
        .filter(booking::Column::Id.eq(booking.id))
        .filter(
            Expr::col(booking::Column::CurrentParticipants)
                .lt(Expr::col(booking::Column::MaxParticipants)),
        )
        .exec(&txn)
        .await;

    match result {
        Ok(res) if res.rows_affected == 1 => {
            txn.commit().await?;
        }
        Ok(_) => {
            txn.rollback().await?;
            return Err(AppError::BadRequest(
                "This group is already full".to_string(),
            ));
        }
        Err(e) => {
            txn.rollback().await?;
            return Err(e.into());
        }
    }

    let booking = booking::Entity::find_by_id(booking.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    let data = load_booking_data(&state.db, booking).await?;

    Ok(Json(ApiResponse::ok("Successfully joined the group", data)))
}

/// Leave a booking group; the creator can never leave
pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let booking = booking::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let member = find_participant(&state.db, booking.id, claims.sub)
        .await?
        .ok_or_else(|| AppError::BadRequest("You are not part of this group".to_string()))?;

    if member.is_creator {
        return Err(AppError::BadRequest(
            "Cannot leave group as you are the creator".to_string(),
        ));
    }

    let txn = state.db.begin().await?;

    let detach = async {
        booking_user::Entity::delete_by_id(member.id).exec(&txn).await?;

        booking::Entity::update_many()
            .col_expr(
                booking::Column::CurrentParticipants,
                Expr::col(booking::Column::CurrentParticipants).sub(1),
            )
            .filter(booking::Column::Id.eq(booking.id))
            .exec(&txn)
            .await?;

        Ok::<(), AppError>(())
    };

    match detach.await {
        Ok(()) => txn.commit().await?,
        Err(e) => {
            txn.rollback().await?;
            return Err(e);
        }
    }

    Ok(Json(ApiResponse::message("Successfully left the group")))
}

/// Look up a booking by its group code
pub async fn search_by_group_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<BookingData>>> {
    let booking = booking::Entity::find()
        .filter(booking::Column::GroupCode.eq(&code))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No booking found with this group code".to_string())
        })?;

    let data = load_booking_data(&state.db, booking).await?;

    Ok(Json(ApiResponse::ok("Booking retrieved successfully", data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 3).unwrap()
    }

    #[test]
    fn future_date_and_valid_time_pass() {
        let (date, time) =
            validate_booking_fields("2025-12-01", "06:00", 10, None, today()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(time, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn past_and_same_day_dates_are_rejected() {
        for raw in ["2025-07-03", "2024-01-01"] {
            let err = validate_booking_fields(raw, "06:00", 10, None, today()).unwrap_err();
            match err {
                AppError::Validation(errors) => assert!(errors.contains_key("booking_date")),
                other => panic!("expected validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn participant_bounds_are_enforced() {
        for max in [0, 21, -3] {
            let err =
                validate_booking_fields("2025-12-01", "06:00", max, None, today()).unwrap_err();
            match err {
                AppError::Validation(errors) => {
                    assert!(errors.contains_key("max_participants"))
                }
                other => panic!("expected validation error, got {:?}", other),
            }
        }
        assert!(validate_booking_fields("2025-12-01", "06:00", 1, None, today()).is_ok());
        assert!(validate_booking_fields("2025-12-01", "06:00", 20, None, today()).is_ok());
    }

    #[test]
    fn bad_time_format_is_rejected() {
        let err = validate_booking_fields("2025-12-01", "6am", 10, None, today()).unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains_key("start_time")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn oversized_notes_are_rejected() {
        let notes = "x".repeat(1001);
        let err = validate_booking_fields("2025-12-01", "06:00", 10, Some(&notes), today())
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains_key("notes")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let notes = "x".repeat(1000);
        assert!(
            validate_booking_fields("2025-12-01", "06:00", 10, Some(&notes), today()).is_ok()
        );
    }
}
