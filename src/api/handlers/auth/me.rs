//! Current-user profile endpoint.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use sqlx::PgPool;

use crate::api::error::ApiError;

use super::session::authenticate;
use super::state::AuthConfig;
use super::types::{Profile, ProfileResponse};

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid credentials", body = super::types::MessageResponse)
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&headers, &pool, &config).await?;
    Ok(Json(ProfileResponse {
        success: true,
        data: Profile {
            id: user.id,
            name: user.name,
            email: user.email,
            telephone: user.telephone,
            role: user.role,
        },
    }))
}
