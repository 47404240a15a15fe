//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, ApiRejection, ErrorCode};
use crate::web::state::AppState;

const SESSION_LIFETIME_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

fn session_cookie(session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        Duration::days(SESSION_LIFETIME_DAYS).num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiRejection> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            "email and password are required",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Failed to create account",
            )
        })?
        .to_string();

    // Creates the user and its free-tier profile in one step.
    let user = state
        .db
        .create_user_with_email(req.email.trim(), &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to create user: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Failed to create account",
            )
        })?;

    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user.user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Failed to create session",
            )
        })?;

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or_default(),
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&auth_session_id))],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiRejection> {
    let user_creds = state
        .db
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|_| {
            reject(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Invalid email or password",
            )
        })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            "Authentication error",
        )
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(reject(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid email or password",
        ));
    }

    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user_creds.user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Failed to create session",
            )
        })?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&auth_session_id))],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, ApiRejection> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            reject(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "No session found",
            )
        })?;

    let auth_session_id = cookie_header
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .ok_or_else(|| {
            reject(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "No session found",
            )
        })?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "Failed to logout",
            )
        })?;

    let cleared = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cleared.to_string())]))
}
