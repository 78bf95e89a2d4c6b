use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::entities::revoked_token;
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::utils::jwt::{create_token, Claims};
use crate::utils::validation::{is_valid_email, Validator};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthData {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<&'static str>,
    pub permissions: Vec<&'static str>,
}

impl UserInfo {
    pub fn from_model(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            roles: vec![user.role.as_str()],
            permissions: user.role.capabilities(),
        }
    }
}

pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string())
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<UserRole> {
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

    // Only self-service roles can be requested at registration
    let role = match payload.role.as_deref() {
        None | Some("user") => UserRole::User,
        Some("guide") => UserRole::Guide,
        Some(_) => {
            v.add("role", "The selected role is invalid");
            UserRole::User
        }
    };

    v.finish()?;
    Ok(role)
}

/// Register a new account and issue a bearer token
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthData>>)> {
    let role = validate_registration(&payload)?;

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&payload.email))
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::validation_field(
            "email",
            "The email has already been taken",
        ));
    }

    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email.clone()),
        password_hash: Set(hash_password(&payload.password)?),
        name: Set(payload.name.trim().to_string()),
        role: Set(role),
        ..Default::default()
    };

    // The unique constraint is the final authority under concurrent signups
    let user = match new_user.insert(&state.db).await {
        Ok(user) => user,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::validation_field(
                "email",
                "The email has already been taken",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let token = create_token(
        user.id,
        &user.email,
        user.role.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully",
            AuthData {
                access_token: token,
                token_type: "Bearer",
                user: UserInfo::from_model(&user),
            },
        )),
    ))
}

/// Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthData>>> {
    let mut v = Validator::new();
    if !is_valid_email(&payload.email) {
        v.add("email", "The email must be a valid email address");
    }
    if payload.password.is_empty() {
        v.add("password", "The password field is required");
    }
    v.finish()?;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&payload.email))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = create_token(
        user.id,
        &user.email,
        user.role.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(ApiResponse::ok(
        "Login successful",
        AuthData {
            access_token: token,
            token_type: "Bearer",
            user: UserInfo::from_model(&user),
        },
    )))
}

/// Revoke the presented token
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<()>>> {
    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .unwrap_or_else(Utc::now);

    let revoked = revoked_token::ActiveModel {
        jti: Set(claims.jti),
        expires_at: Set(expires_at.into()),
        ..Default::default()
    };

    // Logging out twice with the same token is fine
    revoked_token::Entity::insert(revoked)
        .on_conflict(
            OnConflict::column(revoked_token::Column::Jti)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;

    Ok(Json(ApiResponse::message("Logged out successfully")))
}

/// Current user with roles and permissions
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        "User retrieved successfully",
        UserInfo::from_model(&user),
    )))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// Update the caller's profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserInfo>>> {
    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut v = Validator::new();

    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            v.add("name", "The name field is required");
        } else if name.len() > 255 {
            v.add("name", "The name may not be greater than 255 characters");
        }
    }

    if let Some(email) = &payload.email {
        if !is_valid_email(email) {
            v.add("email", "The email must be a valid email address");
        } else if *email != user.email {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::Id.ne(user.id))
                .one(&state.db)
                .await?;
            if taken.is_some() {
                v.add("email", "The email has already been taken");
            }
        }
    }

    if let Some(password) = &payload.password {
        if password.len() < 8 {
            v.add("password", "The password must be at least 8 characters");
        }
        if payload.password_confirmation.as_deref() != Some(password.as_str()) {
            v.add("password", "The password confirmation does not match");
        }
    }

    v.finish()?;

    let mut active: user::ActiveModel = user.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(password) = payload.password {
        active.password_hash = Set(hash_password(&password)?);
    }

    let updated = active.update(&state.db).await?;

    Ok(Json(ApiResponse::ok(
        "Profile updated successfully",
        UserInfo::from_model(&updated),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        name: &str,
        email: &str,
        password: &str,
        confirmation: &str,
        role: Option<&str>,
    ) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirmation: confirmation.to_string(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn valid_registration_defaults_to_user_role() {
        let role = validate_registration(&request(
            "Aisyah",
            "aisyah@example.com",
            "password123",
            "password123",
            None,
        ))
        .unwrap();
        assert_eq!(role, UserRole::User);
    }

    #[test]
    fn guide_role_can_be_requested() {
        let role = validate_registration(&request(
            "Pak Budi",
            "budi@example.com",
            "password123",
            "password123",
            Some("guide"),
        ))
        .unwrap();
        assert_eq!(role, UserRole::Guide);
    }

    #[test]
    fn admin_role_cannot_be_self_assigned() {
        let err = validate_registration(&request(
            "Sneaky",
            "sneaky@example.com",
            "password123",
            "password123",
            Some("admin"),
        ))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn short_password_and_mismatch_are_both_reported() {
        let err = validate_registration(&request(
            "Aisyah",
            "aisyah@example.com",
            "short",
            "different",
            None,
        ))
        .unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors["password"].len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_email_is_rejected() {
        let err = validate_registration(&request(
            "Aisyah",
            "not-an-email",
            "password123",
            "password123",
            None,
        ))
        .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains_key("email")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
