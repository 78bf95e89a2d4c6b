use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sea_orm::EntityTrait;

use crate::entities::revoked_token;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{verify_token, Claims};
use crate::AppState;

/// Extract and validate the bearer token, rejecting tokens revoked by logout
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let auth = auth.ok_or_else(|| AppError::Unauthorized("Unauthenticated".to_string()))?;
    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;

    let revoked = revoked_token::Entity::find_by_id(claims.jti)
        .one(&state.db)
        .await?;
    if revoked.is_some() {
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Require admin privileges (admin or super_admin)
pub async fn require_admin(request: Request, next: Next) -> AppResult<Response> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if !claims.role.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Require the super_admin role
pub async fn require_super_admin(request: Request, next: Next) -> AppResult<Response> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if claims.role != UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Super admin access required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
