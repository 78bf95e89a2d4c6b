use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, catalog, payments};
use crate::middleware::auth::{auth_middleware, require_admin, require_super_admin};
use crate::middleware::rate_limit::{create_public_governor, create_user_governor};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_governor = create_public_governor();
    let user_governor = create_user_governor();

    // Public routes (IP rate limited): registration, login and the payment
    // provider callback
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/payments/webhook", post(payments::webhook))
        .layer(public_governor);

    // Authenticated routes (rate limited per user id)
    let user_routes = Router::new()
        // Session & profile
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::me))
        .route("/profile", put(auth::update_profile))
        // Bookings & groups
        .route("/bookings", get(bookings::index))
        .route("/bookings", post(bookings::store))
        .route("/bookings/join", post(bookings::join_group))
        .route("/bookings/search/{code}", get(bookings::search_by_group_code))
        .route("/bookings/{id}", get(bookings::show))
        .route("/bookings/{id}", put(bookings::update))
        .route("/bookings/{id}", delete(bookings::destroy))
        .route("/bookings/{id}/leave", post(bookings::leave_group))
        // Payments
        .route("/payments", post(payments::create_payment))
        .route("/payments/user", get(payments::get_user_payments))
        .route("/payments/{id}/status", get(payments::get_payment_status))
        // Catalog
        .route("/mounts", get(catalog::list_mounts))
        .route("/mounts/{id}", get(catalog::show_mount))
        .route("/mounts/{id}/trails", get(catalog::list_mount_trails))
        .route("/guides", get(catalog::list_guides))
        .layer(user_governor)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (admin or super_admin)
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::update_user_role))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/guides", get(admin::list_guides))
        .route("/stats", get(admin::user_stats))
        .route("/mounts", post(admin::create_mount))
        .route("/trails", post(admin::create_trail))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Super admin routes
    let super_admin_routes = Router::new()
        .route("/create-admin", post(admin::create_admin))
        .layer(middleware::from_fn(require_super_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/v1", public_routes)
        .nest("/api/v1", user_routes)
        .nest("/api/v1/admin", admin_routes)
        .nest("/api/v1/super-admin", super_admin_routes)
        .with_state(state)
}
