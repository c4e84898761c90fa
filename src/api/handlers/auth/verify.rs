//! Verification endpoint: promotes a pending registration to a
//! verified user and logs the caller in.

use axum::{extract::Extension, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::debug;

use crate::api::error::ApiError;

use super::session::token_response;
use super::state::{AuthConfig, MAX_VERIFY_MISTAKES};
use super::storage::{self, PromoteOutcome};
use super::types::VerifyRequest;
use super::utils::{hash_verification_code, normalize_email};

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Account verified, bearer token issued", body = super::types::TokenResponse),
        (status = 400, description = "Wrong or expired code, or attempts exhausted", body = super::types::MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify(
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    payload: Option<Json<VerifyRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match payload {
        Some(Json(payload)) => payload,
        None => return Err(ApiError::MissingVerification),
    };

    let email = match request.email.as_deref().map(normalize_email) {
        Some(email) if !email.is_empty() => email,
        _ => return Err(ApiError::MissingVerification),
    };
    let code = match request.verification_token.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => return Err(ApiError::MissingVerification),
    };

    let code_hash = hash_verification_code(&code);
    let matched = match storage::find_pending_match(&pool, &email, &code_hash).await {
        Ok(matched) => matched,
        Err(err) => return Err(ApiError::internal(err, "Verification failed")),
    };

    if let Some(pending) = matched {
        return match storage::promote_pending(&pool, &pending).await {
            Ok(PromoteOutcome::Promoted { user_id }) => {
                debug!(email = %email, "pending registration promoted");
                // Verification doubles as the first login.
                token_response(&config, user_id, pending.role)
            }
            // A verified account appeared for this email/telephone in
            // the meantime; report it as a duplicate.
            Ok(PromoteOutcome::Conflict) => Err(ApiError::DuplicateAccount),
            Err(err) => Err(ApiError::internal(err, "Verification failed")),
        };
    }

    // Wrong or expired code: track mistakes on whatever pending row
    // exists for the email, expired or not.
    match storage::record_mistake(&pool, &email, MAX_VERIFY_MISTAKES).await {
        Ok(None) => Err(ApiError::InvalidOrExpiredToken),
        Ok(Some(mistakes)) if mistakes >= MAX_VERIFY_MISTAKES => Err(ApiError::TooManyAttempts),
        Ok(Some(mistakes)) => Err(ApiError::InvalidToken {
            attempts_left: MAX_VERIFY_MISTAKES - mistakes,
        }),
        Err(err) => Err(ApiError::internal(err, "Verification failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::super::types::VerifyRequest;
    use super::verify;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("verify-test-secret"))
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn missing_email_is_rejected() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify(
            Extension(pool),
            Extension(config()),
            Some(Json(VerifyRequest {
                email: None,
                verification_token: Some("123456".to_string()),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn blank_token_is_rejected() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify(
            Extension(pool),
            Extension(config()),
            Some(Json(VerifyRequest {
                email: Some("a@example.com".to_string()),
                verification_token: Some("  ".to_string()),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
