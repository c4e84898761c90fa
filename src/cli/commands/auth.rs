use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long("jwt-secret")
                .help("Secret used to sign session tokens")
                .env("VACQ_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("VACQ_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("cookie-ttl-seconds")
                .long("cookie-ttl-seconds")
                .help("Session cookie TTL in seconds")
                .env("VACQ_COOKIE_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("code-ttl-seconds")
                .long("code-ttl-seconds")
                .help("Verification code TTL in seconds")
                .env("VACQ_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("resend-cooldown-seconds")
                .long("resend-cooldown-seconds")
                .help("Cooldown before a new verification code may be requested")
                .env("VACQ_RESEND_COOLDOWN_SECONDS")
                .default_value("90")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("cookie-secure")
                .long("cookie-secure")
                .help("Mark the session cookie as Secure")
                .env("VACQ_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub cookie_ttl_seconds: i64,
    pub code_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub cookie_secure: bool,
}

impl Options {
    /// Read auth options out of parsed matches.
    ///
    /// # Errors
    /// Returns an error when the JWT secret is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;
        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            token_ttl_seconds: matches
                .get_one::<i64>("token-ttl-seconds")
                .copied()
                .unwrap_or(86_400),
            cookie_ttl_seconds: matches
                .get_one::<i64>("cookie-ttl-seconds")
                .copied()
                .unwrap_or(86_400),
            code_ttl_seconds: matches
                .get_one::<i64>("code-ttl-seconds")
                .copied()
                .unwrap_or(600),
            resend_cooldown_seconds: matches
                .get_one::<i64>("resend-cooldown-seconds")
                .copied()
                .unwrap_or(90),
            cookie_secure: matches.get_flag("cookie-secure"),
        })
    }
}
