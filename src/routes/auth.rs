/// Authentication Routes
///
/// Thin JSON adapters over `AuthService`: registration, login, token
/// refresh, logout and current user information.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthService, IssuedTokens};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::store::User;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<IssuedTokens> for AuthResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }
    }
}

/// Public view of an account; never carries the password hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
pub async fn register(
    form: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = service.register(&form.email, &form.password).await?;
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /auth/login
///
/// # Errors
/// - 400: malformed input
/// - 401: unknown email or wrong password (indistinguishable)
pub async fn login(
    form: web::Json<CredentialsRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = service.login(&form.email, &form.password, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /auth/refresh
///
/// Single use: the presented token is revoked and replaced.
///
/// # Errors
/// - 401: unknown, expired, revoked or already rotated refresh token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = service.refresh(&form.refresh_token, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /auth/logout
///
/// # Errors
/// - 404: token unknown or already revoked
pub async fn logout(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    service.logout(&form.refresh_token, Utc::now()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// Requires `Authorization: Bearer <access_token>`; the identity is injected
/// by the auth gate.
pub async fn get_current_user(
    caller: web::ReqData<AuthenticatedUser>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = service.current_user(caller.user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
