use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::extract::ApiJson;
use crate::api::middleware::{expired_cookie, session_cookie, session_token};
use crate::api::state::AppState;
use crate::conversation::random_avatar;
use crate::crypto::{generate_salt, hash_password, verify_password};
use crate::db::{SessionRepository, SessionUser, UserRepository};
use crate::error::AppError;

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 128;
const MAX_USERNAME_CHARS: usize = 32;
const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
    pub token: String,
    pub expires_at: i64,
}

/// Validate and normalize an email address
fn validate_email(email: &str) -> Result<String, AppError> {
    let trimmed = email.trim();

    let well_formed = trimmed.len() <= MAX_EMAIL_CHARS
        && !trimmed.contains(char::is_whitespace)
        && trimmed
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.contains('@'));

    if !well_formed {
        return Err(AppError::Validation("A valid email address is required".to_string()));
    }

    // Emails are case-insensitive
    Ok(trimmed.to_lowercase())
}

fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();

    if len == 0 || len > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_CHARS
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(AppError::Validation("Username contains invalid characters".to_string()));
    }

    Ok(trimmed.to_string())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "Password must be {}-{} characters",
            MIN_PASSWORD_CHARS, MAX_PASSWORD_CHARS
        )));
    }
    Ok(())
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = validate_email(&req.email)?;
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;

    let avatar = req
        .avatar
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| random_avatar().to_string());

    if UserRepository::get_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Validation("User with this email already exists".to_string()));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&req.password, &salt)?;

    let user = UserRepository::create(&state.db, &email, &username, &password_hash, &salt, &avatar)
        .await?;

    tracing::info!(user_id = %user.id, "New account created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Account created successfully",
        })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".to_string()));
    }

    let invalid = || AppError::Auth("Invalid email or password".to_string());

    let user = UserRepository::get_by_email(&state.db, &req.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash, &user.password_salt)? {
        return Err(invalid());
    }

    let session = SessionRepository::create(
        &state.db,
        &user.id,
        state.config.session_expiry_hours,
    ).await?;

    let cookie = session_cookie(
        &session.token,
        state.config.session_expiry_hours * 3600,
        state.config.cookie_secure,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            user: SessionUser::from(user),
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Ok(Some(token)) = session_token(&headers) {
        SessionRepository::delete(&state.db, token).await?;
    }

    Ok((
        [(header::SET_COOKIE, expired_cookie(state.config.cookie_secure))],
        Json(serde_json::json!({
            "success": true,
            "message": "Logged out successfully",
        })),
    ))
}

/// GET /api/auth/check
pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = match session_token(&headers) {
        Ok(Some(token)) => SessionRepository::resolve_user(&state.db, token).await?,
        _ => None,
    };

    let body = match user {
        Some(user) => serde_json::json!({ "success": true, "user": user }),
        None => serde_json::json!({ "success": false, "message": "Not authenticated" }),
    };

    Ok(Json(body))
}
