//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, email};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(5000);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches);

    Ok(Action::Server(Box::new(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        cookie_ttl_seconds: auth_opts.cookie_ttl_seconds,
        code_ttl_seconds: auth_opts.code_ttl_seconds,
        resend_cooldown_seconds: auth_opts.resend_cooldown_seconds,
        cookie_secure: auth_opts.cookie_secure,
        email_queue_capacity: email_opts.queue_capacity,
        email_max_attempts: email_opts.max_attempts,
        email_retry_backoff_ms: email_opts.retry_backoff_ms,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("VACQ_DSN", Some("postgres://user@localhost:5432/vacq")),
                ("VACQ_JWT_SECRET", Some("dispatch-secret")),
                ("VACQ_PORT", Some("6000")),
                ("VACQ_RESEND_COOLDOWN_SECONDS", Some("30")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["vacq"]);
                let action = handler(&matches).expect("handler should succeed");
                let Action::Server(args) = action;
                assert_eq!(args.port, 6000);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/vacq");
                assert_eq!(args.jwt_secret.expose_secret(), "dispatch-secret");
                assert_eq!(args.resend_cooldown_seconds, 30);
                assert_eq!(args.email_queue_capacity, 256);
            },
        );
    }

    #[test]
    fn handler_applies_defaults() {
        temp_env::with_vars(
            [
                ("VACQ_DSN", Some("postgres://localhost/vacq")),
                ("VACQ_JWT_SECRET", Some("secret")),
                ("VACQ_PORT", None::<&str>),
                ("VACQ_RESEND_COOLDOWN_SECONDS", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["vacq"]);
                let action = handler(&matches).expect("handler should succeed");
                let Action::Server(args) = action;
                assert_eq!(args.port, 5000);
                assert_eq!(args.token_ttl_seconds, 86_400);
                assert_eq!(args.code_ttl_seconds, 600);
                assert_eq!(args.resend_cooldown_seconds, 90);
                assert!(!args.cookie_secure);
            },
        );
    }
}
