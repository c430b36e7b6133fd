//! Authentication API handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use tracing::{info, warn};

use super::dto::{LoginRequest, LoginResponse, UserInfo};
use crate::config::{AdminConfig, StaticUser};
use crate::infrastructure::crypto::jwt::create_token;
use crate::infrastructure::crypto::password::verify_password;
use crate::interfaces::http::common::{ApiError, ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::middleware::{AuthState, AuthenticatedUser};

#[derive(Clone)]
pub struct AuthHandlerState {
    pub auth: AuthState,
    pub users: Arc<AdminConfig>,
}

fn credentials_match(user: &StaticUser, password: &str) -> bool {
    match (&user.password_hash, &user.password) {
        (Some(hash), _) => verify_password(password, hash),
        (None, Some(plain)) => plain == password,
        (None, None) => false,
    }
}

fn session_cookie(name: &str, value: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        name, value, max_age_secs
    ))
    .map_err(|e| ApiError::internal(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login, session cookie set", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthHandlerState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = request.username.trim();
    let Some(user) = state
        .users
        .find(username)
        .filter(|u| credentials_match(u, &request.password))
    else {
        warn!(username, "Rejected login");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let (token, claims) = create_token(&user.username, &user.role, &state.auth.jwt_config)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let expires_in = claims.expires_in_secs();
    let cookie = session_cookie(&state.auth.cookie_name, &token, expires_in)?;

    info!(username = %user.username, role = %user.role, "Operator logged in");
    let body = ApiResponse::success(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in,
        user: UserInfo {
            username: user.username.clone(),
            role: user.role.clone(),
        },
    });
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Authentication",
    responses((status = 200, description = "Session cookie cleared"))
)]
pub async fn logout(State(state): State<AuthHandlerState>) -> Result<impl IntoResponse, ApiError> {
    let cookie = session_cookie(&state.auth.cookie_name, "", 0)?;
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(ApiResponse::success(())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current operator", body = ApiResponse<UserInfo>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_current_user(Extension(user): Extension<AuthenticatedUser>) -> ApiResult<UserInfo> {
    Ok(Json(ApiResponse::success(UserInfo {
        username: user.username,
        role: user.role,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(hash: Option<&str>, plain: Option<&str>) -> StaticUser {
        StaticUser {
            username: "cashier".into(),
            password_hash: hash.map(String::from),
            password: plain.map(String::from),
            role: "operator".into(),
        }
    }

    #[test]
    fn hash_takes_precedence_over_plaintext() {
        let hash = bcrypt::hash("s3cret", 4).unwrap();
        let u = user(Some(&hash), Some("other"));
        assert!(credentials_match(&u, "s3cret"));
        assert!(!credentials_match(&u, "other"));
    }

    #[test]
    fn plaintext_fallback_and_empty_user() {
        assert!(credentials_match(&user(None, Some("pw")), "pw"));
        assert!(!credentials_match(&user(None, Some("pw")), "PW"));
        assert!(!credentials_match(&user(None, None), ""));
    }

    #[test]
    fn cookie_carries_lifetime() {
        let cookie = session_cookie("admin_token", "abc", 3600).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "admin_token=abc; Path=/; HttpOnly; SameSite=Strict; Max-Age=3600"
        );
    }
}
