use std::sync::Arc;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::booking_user;
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::user;
use crate::entities::{mount, trail};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::services::billplz::{Bill, NewBill};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentData {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub billplz_bill_id: String,
    pub payment_url: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<payment::Model> for PaymentData {
    fn from(p: payment::Model) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            billplz_bill_id: p.billplz_bill_id,
            payment_url: p.billplz_url,
            amount: p.amount,
            status: p.status,
            payment_method: p.payment_method,
            paid_at: p.paid_at.map(|t| t.with_timezone(&Utc)),
            created_at: p.created_at.with_timezone(&Utc),
        }
    }
}

// ============ Initiation ============

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,
}

/// Create a Billplz bill for the caller's share of a booking. Re-presenting
/// an unpaid bill returns the existing payment instead of creating another.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PaymentData>>)> {
    let booking = booking::Entity::find_by_id(payload.booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let member = booking_user::Entity::find()
        .filter(booking_user::Column::BookingId.eq(booking.id))
        .filter(booking_user::Column::UserId.eq(claims.sub))
        .one(&state.db)
        .await?;
    if member.is_none() {
        return Err(AppError::Forbidden(
            "You are not part of this booking".to_string(),
        ));
    }

    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cannot pay for a cancelled booking".to_string(),
        ));
    }

    let existing = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking.id))
        .filter(payment::Column::UserId.eq(claims.sub))
        .filter(
            payment::Column::Status.is_in([PaymentStatus::Paid, PaymentStatus::Pending]),
        )
        .order_by_desc(payment::Column::CreatedAt)
        .all(&state.db)
        .await?;

    if existing.iter().any(|p| p.status == PaymentStatus::Paid) {
        return Err(AppError::BadRequest(
            "Payment has already been completed".to_string(),
        ));
    }
    // Re-present the open bill instead of creating a duplicate
    if let Some(pending) = existing.into_iter().find(|p| p.status == PaymentStatus::Pending) {
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::ok("Payment already initiated", pending.into())),
        ));
    }

    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mount_name = mount::Entity::find_by_id(booking.mount_id)
        .one(&state.db)
        .await?
        .map(|m| m.name)
        .unwrap_or_default();
    let trail_name = trail::Entity::find_by_id(booking.trail_id)
        .one(&state.db)
        .await?
        .map(|t| t.name)
        .unwrap_or_default();

    let cents = (booking.total_price * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Internal("Booking price out of range".to_string()))?;

    let bill = state
        .billplz
        .create_bill(&NewBill {
            description: format!("Mount Trail Booking - {} ({})", mount_name, trail_name),
            email: user.email.clone(),
            name: user.name.clone(),
            amount: cents,
        })
        .await?;

    let new_payment = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        user_id: Set(user.id),
        billplz_bill_id: Set(bill.id.clone()),
        billplz_url: Set(bill.url.clone()),
        amount: Set(booking.total_price),
        status: Set(PaymentStatus::Pending),
        billplz_response: Set(Some(bill.raw.clone())),
        ..Default::default()
    };

    let payment = new_payment.insert(&state.db).await?;

    tracing::info!(payment_id = %payment.id, bill_id = %bill.id, "payment initiated");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Payment created successfully",
            payment.into(),
        )),
    ))
}

// ============ Reconciliation ============

/// Fold the provider's bill state into the payment row. Transitions are
/// conditional on the row still being pending, so the polling path and the
/// webhook can race without double-applying.
async fn apply_bill_state(
    db: &DatabaseConnection,
    payment: &payment::Model,
    bill: &Bill,
) -> AppResult<payment::Model> {
    if bill.is_paid() {
        let method = bill
            .raw
            .get("payment_channel")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let result = payment::Entity::update_many()
            .col_expr(payment::Column::Status, PaymentStatus::Paid.as_enum())
            .col_expr(payment::Column::PaidAt, Expr::value(Utc::now()))
            .col_expr(payment::Column::PaymentMethod, Expr::value(method))
            .col_expr(
                payment::Column::BillplzResponse,
                Expr::value(bill.raw.clone()),
            )
            .filter(payment::Column::Id.eq(payment.id))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .exec(db)
            .await?;

        // The first paid payment confirms the booking
        if result.rows_affected == 1 {
            booking::Entity::update_many()
                .col_expr(booking::Column::Status, BookingStatus::Confirmed.as_enum())
                .filter(booking::Column::Id.eq(payment.booking_id))
                .filter(booking::Column::Status.eq(BookingStatus::Pending))
                .exec(db)
                .await?;

            tracing::info!(payment_id = %payment.id, "payment marked as paid");
        }
    } else if bill.state == "failed" || bill.state == "deleted" {
        let result = payment::Entity::update_many()
            .col_expr(payment::Column::Status, PaymentStatus::Failed.as_enum())
            .col_expr(
                payment::Column::BillplzResponse,
                Expr::value(bill.raw.clone()),
            )
            .filter(payment::Column::Id.eq(payment.id))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .exec(db)
            .await?;

        if result.rows_affected == 1 {
            tracing::info!(payment_id = %payment.id, state = %bill.state, "payment marked as failed");
        }
    }

    payment::Entity::find_by_id(payment.id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
}

/// Payment status; polls the provider while the payment is still pending
pub async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentData>>> {
    let payment = payment::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You are not authorized to view this payment".to_string(),
        ));
    }

    let payment = if payment.status == PaymentStatus::Pending {
        let bill = state.billplz.get_bill(&payment.billplz_bill_id).await?;
        apply_bill_state(&state.db, &payment, &bill).await?
    } else {
        payment
    };

    Ok(Json(ApiResponse::ok(
        "Payment status retrieved successfully",
        payment.into(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub id: String,
    pub state: Option<String>,
    pub paid: Option<String>,
}

/// Billplz callback. Unknown bill ids are logged and rejected; known bills
/// are reconciled with the posted state.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<WebhookPayload>,
) -> AppResult<Json<ApiResponse<()>>> {
    let payment = payment::Entity::find()
        .filter(payment::Column::BillplzBillId.eq(&payload.id))
        .one(&state.db)
        .await?;

    let Some(payment) = payment else {
        tracing::warn!(bill_id = %payload.id, "webhook for unknown bill");
        return Err(AppError::NotFound("Payment not found".to_string()));
    };

    let state_str = match payload.state.as_deref() {
        Some(s) => s.to_string(),
        // Older callback format only carries the paid flag
        None if payload.paid.as_deref() == Some("true") => "paid".to_string(),
        None => "due".to_string(),
    };

    let bill = Bill {
        id: payload.id.clone(),
        url: payment.billplz_url.clone(),
        state: state_str,
        raw: serde_json::json!({
            "id": payload.id,
            "state": payload.state,
            "paid": payload.paid,
        }),
    };

    apply_bill_state(&state.db, &payment, &bill).await?;

    Ok(Json(ApiResponse::message("Webhook processed successfully")))
}

// ============ History ============

/// All payments made by the caller, newest first
pub async fn get_user_payments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<Vec<PaymentData>>>> {
    let payments = payment::Entity::find()
        .filter(payment::Column::UserId.eq(claims.sub))
        .order_by_desc(payment::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let data = payments.into_iter().map(PaymentData::from).collect();

    Ok(Json(ApiResponse::ok(
        "Payments retrieved successfully",
        data,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn pending_payment() -> payment::Model {
        payment::Model {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            billplz_bill_id: "billx001".to_string(),
            billplz_url: "https://billplz.test/bills/billx001".to_string(),
            amount: Decimal::new(25000, 2),
            status: PaymentStatus::Pending,
            payment_method: None,
            paid_at: None,
            billplz_response: None,
            created_at: Utc::now().into(),
        }
    }

    fn bill(state: &str) -> Bill {
        Bill {
            id: "billx001".to_string(),
            url: "https://billplz.test/bills/billx001".to_string(),
            state: state.to_string(),
            raw: json!({ "id": "billx001", "state": state }),
        }
    }

    fn update_count(db: sea_orm::DatabaseConnection) -> usize {
        db.into_transaction_log()
            .iter()
            .filter(|t| format!("{:?}", t).contains("UPDATE"))
            .count()
    }

    #[tokio::test]
    async fn failed_bill_state_marks_payment_failed() {
        let payment = pending_payment();
        let mut after = payment.clone();
        after.status = PaymentStatus::Failed;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![after]])
            .into_connection();

        let result = apply_bill_state(&db, &payment, &bill("failed")).await.unwrap();

        assert_eq!(result.status, PaymentStatus::Failed);
        assert_eq!(update_count(db), 1);
    }

    #[tokio::test]
    async fn deleted_bill_state_also_marks_payment_failed() {
        let payment = pending_payment();
        let mut after = payment.clone();
        after.status = PaymentStatus::Failed;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![after]])
            .into_connection();

        let result = apply_bill_state(&db, &payment, &bill("deleted")).await.unwrap();

        assert_eq!(result.status, PaymentStatus::Failed);
        assert_eq!(update_count(db), 1);
    }

    #[tokio::test]
    async fn paid_transition_confirms_booking_on_first_apply() {
        let payment = pending_payment();
        let mut after = payment.clone();
        after.status = PaymentStatus::Paid;
        after.paid_at = Some(Utc::now().into());

        // Payment update hits a pending row, so the booking update follows
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .append_query_results([vec![after]])
            .into_connection();

        let result = apply_bill_state(&db, &payment, &bill("paid")).await.unwrap();

        assert_eq!(result.status, PaymentStatus::Paid);
        assert!(result.paid_at.is_some());
        assert_eq!(update_count(db), 2);
    }

    #[tokio::test]
    async fn paid_transition_is_a_noop_on_terminal_rows() {
        let mut payment = pending_payment();
        payment.status = PaymentStatus::Paid;
        payment.paid_at = Some(Utc::now().into());

        // Conditional update misses (row no longer pending): the booking
        // must not be touched a second time
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![payment.clone()]])
            .into_connection();

        let result = apply_bill_state(&db, &payment, &bill("paid")).await.unwrap();

        assert_eq!(result.status, PaymentStatus::Paid);
        assert_eq!(update_count(db), 1);
    }

    #[tokio::test]
    async fn due_bill_state_leaves_payment_untouched() {
        let payment = pending_payment();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![payment.clone()]])
            .into_connection();

        let result = apply_bill_state(&db, &payment, &bill("due")).await.unwrap();

        assert_eq!(result.status, PaymentStatus::Pending);
        assert_eq!(update_count(db), 0);
    }
}
