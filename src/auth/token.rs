use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Role;

/// HS256 signing configuration, shared with handlers via `web::Data`.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    expiry_minutes: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            expiry_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: i64,
}

pub fn issue_token(config: &TokenConfig, user_id: Uuid, name: &str, role: Role) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (Utc::now() + Duration::minutes(config.expiry_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

pub fn verify_token(config: &TokenConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig::new("test-secret", 30)
    }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let cfg = config();
        let user_id = Uuid::new_v4();
        let token = issue_token(&cfg, user_id, "Alice", Role::Employee).unwrap();

        let claims = verify_token(&cfg, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.role, Role::Employee);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&config(), Uuid::new_v4(), "Mallory", Role::Admin).unwrap();

        let other = TokenConfig::new("different-secret", 30);
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = TokenConfig::new("test-secret", -5);
        let token = issue_token(&cfg, Uuid::new_v4(), "Bob", Role::Client).unwrap();

        let err = verify_token(&cfg, &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token(&config(), "not.a.jwt").is_err());
    }
}
