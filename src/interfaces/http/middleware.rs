//! Authentication middleware for Axum
//!
//! Accepts a JWT either as `Authorization: Bearer <token>` or in the
//! session cookie set by the login endpoint.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::common::ApiError;
use crate::infrastructure::crypto::jwt::{verify_token, JwtConfig, TokenClaims};

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

/// Authentication state shared by the middleware and the auth handlers
#[derive(Clone)]
pub struct AuthState {
    pub jwt_config: JwtConfig,
    pub cookie_name: String,
}

/// Where the token was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    Cookie,
}

/// Operator identity inserted into request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: String,
    pub auth_method: AuthMethod,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims, auth_method: AuthMethod) -> Self {
        Self {
            username: claims.sub,
            role: claims.role,
            auth_method,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty())
}

/// Resolve the caller from request headers.
pub fn authenticate(headers: &HeaderMap, state: &AuthState) -> Result<AuthenticatedUser, AuthError> {
    let (token, method) = match extract_bearer(headers) {
        Some(token) => (token, AuthMethod::Bearer),
        None => match extract_cookie(headers, &state.cookie_name) {
            Some(token) => (token, AuthMethod::Cookie),
            None => return Err(AuthError::MissingToken),
        },
    };

    verify_token(token, &state.jwt_config)
        .map(|claims| AuthenticatedUser::from_claims(claims, method))
        .map_err(|_| AuthError::InvalidToken)
}

/// JWT authentication middleware
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &auth_state) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => auth_error_response(e),
    }
}

fn auth_error_response(error: AuthError) -> Response {
    let message = match error {
        AuthError::MissingToken => "Missing authentication token",
        AuthError::InvalidToken => "Invalid or expired authentication token",
    };
    ApiError::unauthorized(message).into_response()
}
