use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::token::issue_token;
use crate::auth::{Identity, TokenConfig};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::user::{NewUserRow, Role, UserRow};
use crate::schema::users;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

/// Variant-shaped profile: clients carry `points`, staff carry `start_date`
/// and `is_admin`; the unused side is null.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub points: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub is_admin: Option<bool>,
}

impl ProfileResponse {
    fn try_from_row(row: UserRow) -> Result<Self, AppError> {
        let role = row.parsed_role().map_err(AppError::Internal)?;
        Ok(match role {
            Role::Client => ProfileResponse {
                id: row.id,
                email: row.email,
                display_name: row.display_name,
                phone: row.phone,
                role,
                points: row.points,
                start_date: None,
                is_admin: None,
            },
            Role::Employee | Role::Admin => ProfileResponse {
                id: row.id,
                email: row.email,
                display_name: row.display_name,
                phone: row.phone,
                role,
                points: None,
                start_date: row.start_date,
                is_admin: Some(role == Role::Admin),
            },
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let name_len = req.display_name.trim().len();
    if !(2..=100).contains(&name_len) {
        return Err(AppError::BadRequest(
            "Display name must be between 2 and 100 characters".to_string(),
        ));
    }
    Ok(())
}

fn insert_user(conn: &mut PgConnection, row: NewUserRow) -> Result<Uuid, AppError> {
    let id = row.id;
    diesel::insert_into(users::table)
        .values(&row)
        .execute(conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => other.into(),
        })?;
    Ok(id)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /auth/register
///
/// Public client registration. New clients start with zero loyalty points
/// and no open order.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Client registered"),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    pool: web::Data<DbPool>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    validate_registration(&body)?;

    let id = web::block(move || {
        let mut conn = pool.get()?;
        let hash = hash_password(&body.password)?;
        insert_user(
            &mut conn,
            NewUserRow::client(body.email, body.display_name, body.phone, hash),
        )
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

async fn register_staff(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: RegisterRequest,
    role: Role,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;
    validate_registration(&body)?;

    let id = web::block(move || {
        let mut conn = pool.get()?;
        let hash = hash_password(&body.password)?;
        insert_user(
            &mut conn,
            NewUserRow::staff(
                role,
                body.email,
                body.display_name,
                body.phone,
                hash,
                Utc::now().date_naive(),
            ),
        )
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// POST /auth/employee/register (admin only)
#[utoipa::path(
    post,
    path = "/auth/employee/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Employee registered"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "auth"
)]
pub async fn register_employee(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    register_staff(pool, identity, body.into_inner(), Role::Employee).await
}

/// POST /auth/admin/register (admin only)
#[utoipa::path(
    post,
    path = "/auth/admin/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Admin registered"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "auth"
)]
pub async fn register_admin(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    register_staff(pool, identity, body.into_inner(), Role::Admin).await
}

/// POST /auth/login
///
/// Verifies the argon2 password hash and issues a bearer token carrying
/// id, display name and role claims.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: web::Data<DbPool>,
    token_config: web::Data<TokenConfig>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let user = web::block(move || {
        let mut conn = pool.get()?;
        users::table
            .filter(users::email.eq(&body.email))
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?
            .filter(|u| verify_password(&body.password, &u.password_hash))
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))
    })
    .await??;

    let role = user.parsed_role().map_err(AppError::Internal)?;
    let token = issue_token(&token_config, user.id, &user.display_name, role)?;

    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}

/// GET /auth/profile
#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 404, description = "Account no longer exists"),
    ),
    tag = "auth"
)]
pub async fn get_profile(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let user = web::block(move || {
        let mut conn = pool.get()?;
        users::table
            .find(identity.user_id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProfileResponse::try_from_row(user)?))
}

/// GET /auth/profile/{id} (admin only)
#[utoipa::path(
    get,
    path = "/auth/profile/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
    ),
    tag = "auth"
)]
pub async fn get_profile_by_id(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;
    let user_id = path.into_inner();

    let user = web::block(move || {
        let mut conn = pool.get()?;
        users::table
            .find(user_id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProfileResponse::try_from_row(user)?))
}

/// GET /auth/profiles (admin only)
#[utoipa::path(
    get,
    path = "/auth/profiles",
    responses(
        (status = 200, description = "All profiles", body = [ProfileResponse]),
        (status = 403, description = "Admin role required"),
    ),
    tag = "auth"
)]
pub async fn list_profiles(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;

    let rows = web::block(move || {
        let mut conn = pool.get()?;
        users::table
            .order(users::created_at.asc())
            .select(UserRow::as_select())
            .load(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    let profiles: Result<Vec<ProfileResponse>, AppError> =
        rows.into_iter().map(ProfileResponse::try_from_row).collect();

    Ok(HttpResponse::Ok().json(profiles?))
}

/// PUT /auth/profile
///
/// Updates the caller's display name and phone number.
#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 404, description = "Account no longer exists"),
    ),
    tag = "auth"
)]
pub async fn update_profile(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let name_len = body.display_name.trim().len();
    if !(2..=100).contains(&name_len) {
        return Err(AppError::BadRequest(
            "Display name must be between 2 and 100 characters".to_string(),
        ));
    }

    let user = web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(users::table.find(identity.user_id))
            .set((
                users::display_name.eq(&body.display_name),
                users::phone.eq(body.phone.clone()),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        users::table
            .find(identity.user_id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProfileResponse::try_from_row(user)?))
}

/// PATCH /auth/profile/password
#[utoipa::path(
    patch,
    path = "/auth/profile/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Incorrect current password or weak new password"),
    ),
    tag = "auth"
)]
pub async fn change_password(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if body.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    web::block(move || {
        let mut conn = pool.get()?;
        let user = users::table
            .find(identity.user_id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(&body.old_password, &user.password_hash) {
            return Err(AppError::BadRequest("Incorrect password".to_string()));
        }

        let hash = hash_password(&body.new_password)?;
        diesel::update(users::table.find(identity.user_id))
            .set((
                users::password_hash.eq(hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

/// DELETE /auth/profile
#[utoipa::path(
    delete,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Account deleted"),
        (status = 404, description = "Account no longer exists"),
    ),
    tag = "auth"
)]
pub async fn delete_account(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    web::block(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(users::table.find(identity.user_id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "Account deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: name.to_string(),
            phone: None,
        }
    }

    #[test]
    fn registration_rejects_bad_email() {
        let err = validate_registration(&request("nope", "secret1", "Alice")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn registration_rejects_short_password() {
        let err = validate_registration(&request("a@b.com", "abc", "Alice")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn registration_rejects_one_char_name() {
        let err = validate_registration(&request("a@b.com", "secret1", "A")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn registration_accepts_valid_input() {
        assert!(validate_registration(&request("a@b.com", "secret1", "Alice")).is_ok());
    }
}
