//! Login endpoint.

use axum::{extract::Extension, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::debug;

use crate::api::error::ApiError;

use super::session::token_response;
use super::state::AuthConfig;
use super::storage;
use super::types::LoginRequest;
use super::utils::{normalize_email, verify_password};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, bearer token issued", body = super::types::TokenResponse),
        (status = 400, description = "Missing fields or unknown account", body = super::types::MessageResponse),
        (status = 401, description = "Wrong password", body = super::types::MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match payload {
        Some(Json(payload)) => payload,
        None => return Err(ApiError::MissingCredentials),
    };

    let email = match request.email.as_deref().map(normalize_email) {
        Some(email) if !email.is_empty() => email,
        _ => return Err(ApiError::MissingCredentials),
    };
    let Some(password) = request.password.filter(|password| !password.is_empty()) else {
        return Err(ApiError::MissingCredentials);
    };

    let user = match storage::user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(email = %email, "login for unknown email");
            return Err(ApiError::InvalidCredentials);
        }
        Err(err) => return Err(ApiError::internal(err, "Cannot log in")),
    };

    if !verify_password(&password, &user.password_hash) {
        debug!(email = %email, "login with wrong password");
        return Err(ApiError::WrongPassword);
    }

    token_response(&config, user.id, user.role)
}
