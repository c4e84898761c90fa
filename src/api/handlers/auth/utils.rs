//! Small helpers for account validation, one-time codes, and password
//! hashing.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use sha2::{Digest, Sha256};

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Telephone format: international `+` form or a local 0-prefixed
/// number of 9-10 digits.
pub(crate) fn valid_telephone(telephone: &str) -> bool {
    Regex::new(r"^(\+?[1-9]\d{1,14}|0\d{8,9})$").is_ok_and(|regex| regex.is_match(telephone))
}

pub(crate) fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN
}

/// Generate a 6-digit one-time code in 100000-999999.
///
/// The plaintext code goes only into the verification email; the
/// database stores its digest.
pub(crate) fn generate_verification_code() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

/// Digest a one-time code so raw codes never touch the database.
pub(crate) fn hash_verification_code(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a password with a fresh random salt.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Constant-time comparison against a stored password hash. Unparseable
/// hashes count as a mismatch.
pub(crate) fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
