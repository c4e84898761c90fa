//! Registration endpoint: creates or reissues a pending registration
//! and queues the verification email.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use crate::api::email::{verification_email, EmailQueue};
use crate::api::error::ApiError;

use super::state::AuthConfig;
use super::storage::{self, NewPending};
use super::types::{MessageResponse, RegisterRequest};
use super::utils::{
    generate_verification_code, hash_password, hash_verification_code, normalize_email,
    valid_email, valid_password, valid_telephone,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Pending registration created or reissued", body = MessageResponse),
        (status = 400, description = "Validation failure or duplicate account", body = MessageResponse),
        (status = 429, description = "Code was requested too recently", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    queue: Extension<EmailQueue>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match payload {
        Some(Json(payload)) => payload,
        None => return Err(ApiError::Validation("Missing payload".to_string())),
    };

    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("Please add a name".to_string()));
    }
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Please add a valid email".to_string()));
    }
    if !valid_telephone(&request.telephone) {
        return Err(ApiError::Validation(
            "Please add a valid telephone number".to_string(),
        ));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    match storage::verified_conflict_exists(&pool, &email, &request.telephone).await {
        Ok(true) => return Err(ApiError::DuplicateAccount),
        Ok(false) => (),
        Err(err) => return Err(ApiError::internal(err, "Cannot register user")),
    }

    // Throttle resends against the previous pending record, if any.
    match storage::pending_last_code_sent_at(&pool, &email).await {
        Ok(Some(last_sent)) => {
            let elapsed_ms = Utc::now()
                .signed_duration_since(last_sent)
                .num_milliseconds();
            let cooldown_ms = config.resend_cooldown_seconds() * 1000;
            if elapsed_ms < cooldown_ms {
                // Remaining wait in whole seconds, rounded up.
                let retry_after_secs = (cooldown_ms - elapsed_ms + 999) / 1000;
                return Err(ApiError::RateLimited { retry_after_secs });
            }
        }
        Ok(None) => (),
        Err(err) => return Err(ApiError::internal(err, "Cannot register user")),
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => return Err(ApiError::internal(err, "Cannot register user")),
    };

    let code = generate_verification_code();
    let pending = NewPending {
        email: &email,
        name: request.name.trim(),
        telephone: &request.telephone,
        password_hash: &password_hash,
        role: request.role,
        code_hash: hash_verification_code(&code),
        code_ttl_seconds: config.code_ttl_seconds(),
    };

    if let Err(err) = storage::upsert_pending(&pool, &pending).await {
        return Err(ApiError::internal(err, "Cannot register user"));
    }

    debug!(email = %email, "pending registration stored, queueing code email");
    queue.enqueue(verification_email(&email, &code));

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message: "Registration successful. Please check your email for verification."
                .to_string(),
        }),
    ))
}
