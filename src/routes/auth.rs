/// Authentication Routes
///
/// Registration, login, token refresh, logout, password change and the
/// current user.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, AuthSession, Registration, TokenPair};
use crate::error::AppError;
use crate::middleware::Authenticated;
use crate::models::UserResponse;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Body of register and login responses
#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserResponse::from(&session.user),
            tokens: session.tokens,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct RefreshResponse {
    pub tokens: TokenPair,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// POST /api/v1/auth/register
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
pub async fn register(
    form: web::Json<Registration>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth.register(form.into_inner()).await?;
    Ok(HttpResponse::Created().json(AuthResponse::from(session)))
}

/// POST /api/v1/auth/login
///
/// # Errors
/// - 401: Invalid credentials (unknown email and wrong password look the same)
/// - 403: Account is not active
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth.login(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

/// POST /api/v1/auth/refresh
///
/// Single use: the presented refresh token stops working once this succeeds.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.refresh_tokens(&form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(RefreshResponse { tokens }))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    caller: Authenticated,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.logout(caller.user_id()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out successfully")))
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    caller: Authenticated,
    form: web::Json<ChangePasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.change_password(caller.user_id(), &form.old_password, &form.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed successfully")))
}

/// GET /api/v1/auth/me
pub async fn get_current_user(caller: Authenticated) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(&caller.user))
}
