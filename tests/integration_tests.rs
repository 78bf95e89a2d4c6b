use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveTime, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use mount_trail_backend::config::Config;
use mount_trail_backend::entities::booking::{self, BookingStatus};
use mount_trail_backend::entities::booking_user::{self, ParticipantStatus};
use mount_trail_backend::entities::payment::{self, PaymentStatus};
use mount_trail_backend::entities::revoked_token;
use mount_trail_backend::entities::user::UserRole;
use mount_trail_backend::error::{AppError, AppResult};
use mount_trail_backend::routes::create_router;
use mount_trail_backend::services::billplz::{Bill, BillplzProvider, NewBill};
use mount_trail_backend::utils::jwt::create_token;
use mount_trail_backend::AppState;

const JWT_SECRET: &str = "integration-test-secret";

/// Provider double that never talks to the network
struct MockBillplz;

#[async_trait]
impl BillplzProvider for MockBillplz {
    async fn create_bill(&self, _bill: &NewBill) -> AppResult<Bill> {
        Ok(Bill {
            id: "mockbill1".to_string(),
            url: "https://billplz.test/bills/mockbill1".to_string(),
            state: "due".to_string(),
            raw: json!({ "id": "mockbill1", "state": "due" }),
        })
    }

    async fn get_bill(&self, bill_id: &str) -> AppResult<Bill> {
        Err(AppError::Provider(format!("unexpected get_bill({})", bill_id)))
    }
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration_hours: 24,
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        billplz_api_key: "test-key".to_string(),
        billplz_collection_id: "test-collection".to_string(),
        billplz_base_url: "https://billplz.test/api/v3".to_string(),
        payment_callback_url: "https://app.test/api/v1/payments/webhook".to_string(),
        payment_redirect_url: "https://app.test/payment/redirect".to_string(),
    }
}

fn app(db: DatabaseConnection) -> Router {
    create_router(Arc::new(AppState {
        db,
        config: test_config(),
        billplz: Arc::new(MockBillplz),
    }))
}

fn bearer_token(role: UserRole) -> String {
    token_for(Uuid::new_v4(), role)
}

fn token_for(user_id: Uuid, role: UserRole) -> String {
    create_token(user_id, "tester@example.com", role, JWT_SECRET, 24).unwrap()
}

fn sample_booking(current: i32, max: i32) -> booking::Model {
    booking::Model {
        id: Uuid::new_v4(),
        group_code: "ABCD-EFGH".to_string(),
        mount_id: 1,
        trail_id: 1,
        guide_id: Uuid::new_v4(),
        created_by: Uuid::new_v4(),
        booking_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
        start_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        max_participants: max,
        current_participants: current,
        total_price: Decimal::new(25000, 2),
        status: BookingStatus::Pending,
        notes: None,
        created_at: Utc::now().into(),
    }
}

fn roster_row(booking_id: Uuid, user_id: Uuid, is_creator: bool) -> booking_user::Model {
    booking_user::Model {
        id: Uuid::new_v4(),
        booking_id,
        user_id,
        is_creator,
        status: ParticipantStatus::Confirmed,
        joined_at: Utc::now().into(),
    }
}

fn pending_payment(booking_id: Uuid, user_id: Uuid, bill_id: &str) -> payment::Model {
    payment::Model {
        id: Uuid::new_v4(),
        booking_id,
        user_id,
        billplz_bill_id: bill_id.to_string(),
        billplz_url: format!("https://billplz.test/bills/{}", bill_id),
        amount: Decimal::new(25000, 2),
        status: PaymentStatus::Pending,
        payment_method: None,
        paid_at: None,
        billplz_response: None,
        created_at: Utc::now().into(),
    }
}

/// Requests carry a peer address so the IP rate limiter can extract its key
fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_with_invalid_payload_returns_422() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "name": "Tester",
                        "email": "not-an-email",
                        "password": "short",
                        "password_confirmation": "short",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn protected_route_without_token_returns_401() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            request("GET", "/api/v1/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Unauthenticated"));
}

#[tokio::test]
async fn garbage_token_returns_401() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            request("GET", "/api/v1/user")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn join_with_malformed_group_code_returns_422() {
    // One query: the revocation check in the auth middleware
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .into_connection();

    let token = bearer_token(UserRole::User);
    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/bookings/join")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "group_code": "bad-code" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert!(body["errors"]["group_code"].is_array());
}

#[tokio::test]
async fn admin_route_with_user_token_returns_403() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .into_connection();

    let token = bearer_token(UserRole::User);
    let response = app(db)
        .oneshot(
            request("GET", "/api/v1/admin/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Admin access required"));
}

#[tokio::test]
async fn super_admin_route_with_admin_token_returns_403() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .into_connection();

    let token = bearer_token(UserRole::Admin);
    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/super-admin/create-admin")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "name": "New Admin",
                        "email": "new-admin@example.com",
                        "password": "password123",
                        "password_confirmation": "password123",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn joining_a_full_group_is_rejected() {
    let booking = sample_booking(2, 2);

    // Queries: revocation check, booking lookup by code, membership check.
    // No roster insert or counter update may follow the rejection.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .append_query_results([vec![booking]])
        .append_query_results([Vec::<booking_user::Model>::new()])
        .into_connection();

    let token = bearer_token(UserRole::User);
    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/bookings/join")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "group_code": "ABCD-EFGH" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("This group is already full"));
}

#[tokio::test]
async fn creator_cannot_leave_their_own_group() {
    let user_id = Uuid::new_v4();
    let booking = sample_booking(2, 4);
    let creator_row = roster_row(booking.id, user_id, true);
    let booking_id = booking.id;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .append_query_results([vec![booking]])
        .append_query_results([vec![creator_row]])
        .into_connection();

    let token = token_for(user_id, UserRole::User);
    let response = app(db)
        .oneshot(
            request("POST", &format!("/api/v1/bookings/{}/leave", booking_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        json!("Cannot leave group as you are the creator")
    );
}

#[tokio::test]
async fn repeated_payment_initiation_returns_existing_pending_payment() {
    let user_id = Uuid::new_v4();
    let booking = sample_booking(2, 4);
    let member = roster_row(booking.id, user_id, false);
    let existing = pending_payment(booking.id, user_id, "existing01");
    let booking_id = booking.id;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<revoked_token::Model>::new()])
        .append_query_results([vec![booking]])
        .append_query_results([vec![member]])
        .append_query_results([vec![existing]])
        .into_connection();

    let token = token_for(user_id, UserRole::User);
    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/payments")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "booking_id": booking_id }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    // 200, not 201: no second bill was created with the provider
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Payment already initiated"));
    assert_eq!(body["data"]["billplz_bill_id"], json!("existing01"));
}

#[tokio::test]
async fn webhook_failed_state_marks_payment_failed() {
    let payment = pending_payment(Uuid::new_v4(), Uuid::new_v4(), "billfail1");
    let mut after = payment.clone();
    after.status = PaymentStatus::Failed;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![payment], vec![after]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/payments/webhook")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("id=billfail1&state=failed"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn webhook_for_unknown_bill_returns_404() {
    // One query: the bill id lookup, which finds nothing
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<payment::Model>::new()])
        .into_connection();

    let response = app(db)
        .oneshot(
            request("POST", "/api/v1/payments/webhook")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("id=nosuchbill&state=paid"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Payment not found"));
}
