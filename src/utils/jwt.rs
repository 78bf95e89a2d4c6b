use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user id
    pub email: String,
    pub role: UserRole,
    pub jti: Uuid,       // token id, checked against the revocation table
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

pub fn create_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        jti: Uuid::new_v4(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token =
            create_token(user_id, "hiker@example.com", UserRole::User, "secret", 24).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "hiker@example.com");
        assert_eq!(claims.role, UserRole::User);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            create_token(Uuid::new_v4(), "hiker@example.com", UserRole::User, "secret", 24)
                .unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let user_id = Uuid::new_v4();
        let a = create_token(user_id, "a@example.com", UserRole::User, "secret", 24).unwrap();
        let b = create_token(user_id, "a@example.com", UserRole::User, "secret", 24).unwrap();

        let ca = verify_token(&a, "secret").unwrap();
        let cb = verify_token(&b, "secret").unwrap();
        assert_ne!(ca.jti, cb.jti);
    }
}
