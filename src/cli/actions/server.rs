use crate::api;
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub cookie_ttl_seconds: i64,
    pub code_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub cookie_secure: bool,
    pub email_queue_capacity: usize,
    pub email_max_attempts: u32,
    pub email_retry_backoff_ms: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the database is unreachable or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.jwt_secret)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_cookie_ttl_seconds(args.cookie_ttl_seconds)
        .with_code_ttl_seconds(args.code_ttl_seconds)
        .with_resend_cooldown_seconds(args.resend_cooldown_seconds)
        .with_cookie_secure(args.cookie_secure);

    let email_config = api::EmailQueueConfig::new()
        .with_capacity(args.email_queue_capacity)
        .with_max_attempts(args.email_max_attempts)
        .with_retry_backoff(Duration::from_millis(args.email_retry_backoff_ms));

    api::new(args.port, args.dsn, auth_config, email_config).await
}
