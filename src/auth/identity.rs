use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Role;

use super::token::{verify_token, TokenConfig};

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Handlers take this by value; role checks happen per-endpoint.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Employee or admin role required".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }
}

fn identity_from_request(req: &HttpRequest) -> Result<Identity, AppError> {
    let config = req
        .app_data::<web::Data<TokenConfig>>()
        .ok_or_else(|| AppError::Internal("Token config not registered".to_string()))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))?;

    let claims = verify_token(config, token)?;

    Ok(Identity {
        user_id: claims.sub,
        name: claims.name,
        role: claims.role,
    })
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(identity_from_request(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::issue_token;
    use actix_web::test::TestRequest;

    fn config() -> TokenConfig {
        TokenConfig::new("test-secret", 30)
    }

    #[actix_web::test]
    async fn extracts_identity_from_bearer_token() {
        let cfg = config();
        let user_id = Uuid::new_v4();
        let token = issue_token(&cfg, user_id, "Alice", Role::Admin).unwrap();

        let req = TestRequest::default()
            .app_data(web::Data::new(cfg))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let identity = identity_from_request(&req).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, Role::Admin);
        assert!(identity.require_admin().is_ok());
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(web::Data::new(config()))
            .to_http_request();

        let err = identity_from_request(&req).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn non_bearer_scheme_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(web::Data::new(config()))
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();

        let err = identity_from_request(&req).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn client_fails_staff_and_admin_checks() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            name: "Carol".to_string(),
            role: Role::Client,
        };
        assert!(identity.require_staff().is_err());
        assert!(identity.require_admin().is_err());
    }

    #[test]
    fn employee_passes_staff_but_not_admin() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            name: "Dan".to_string(),
            role: Role::Employee,
        };
        assert!(identity.require_staff().is_ok());
        assert!(identity.require_admin().is_err());
    }
}
