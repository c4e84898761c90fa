//! Cookie/bearer session plumbing and the logout endpoint.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::state::AuthConfig;
use super::storage::{self, UserRow};
use super::token;
use super::types::{Role, TokenResponse};

pub(crate) const AUTH_COOKIE_NAME: &str = "token";

/// Resolve the caller into a verified user or fail with 401.
///
/// The bearer header wins over the cookie. Claims are re-resolved
/// against the user store so deleted accounts lose access immediately.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<UserRow, ApiError> {
    let token = extract_token(headers).ok_or(ApiError::Unauthorized)?;
    let claims = token::verify(config.jwt_secret(), &token).map_err(|_| ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;
    match storage::user_by_id(pool, user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::Unauthorized),
        Err(err) => Err(ApiError::internal(err, "Cannot authenticate request")),
    }
}

/// Build the login/verify success response: bearer token in the body
/// and the same value as an http-only cookie.
pub(crate) fn token_response(
    config: &AuthConfig,
    user_id: Uuid,
    role: Role,
) -> Result<Response, ApiError> {
    let token = token::issue(config.jwt_secret(), user_id, role, config.token_ttl_seconds())
        .map_err(|err| ApiError::internal(err, "Cannot issue token"))?;

    let mut headers = HeaderMap::new();
    match auth_cookie(config, &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => return Err(ApiError::internal(err, "Cannot issue token")),
    }

    let body = TokenResponse {
        success: true,
        token,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Auth cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(config: Extension<AuthConfig>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_auth_cookie(&config) {
        headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        headers,
        Json(json!({"success": true, "data": {}})),
    )
}

fn auth_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.cookie_ttl_seconds();
    let mut cookie =
        format!("{AUTH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_auth_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{AUTH_COOKIE_NAME}=none; Path=/; HttpOnly; SameSite=Lax; Max-Age=10");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == AUTH_COOKIE_NAME && !val.is_empty() && val != "none" {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
