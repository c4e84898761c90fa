//! Database helpers for pending registrations and verified users.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::Role;
use super::utils::is_unique_violation;

/// A verified account row.
pub(crate) struct UserRow {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) telephone: String,
    pub(crate) password_hash: String,
    pub(crate) role: Role,
}

/// A not-yet-verified submission, keyed by email.
pub(crate) struct PendingRow {
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) telephone: String,
    pub(crate) password_hash: String,
    pub(crate) role: Role,
}

/// Fields written when a registration is created or reissued.
pub(crate) struct NewPending<'a> {
    pub(crate) email: &'a str,
    pub(crate) name: &'a str,
    pub(crate) telephone: &'a str,
    pub(crate) password_hash: &'a str,
    pub(crate) role: Role,
    pub(crate) code_hash: Vec<u8>,
    pub(crate) code_ttl_seconds: i64,
}

/// Outcome of promoting a pending registration to a verified user.
pub(crate) enum PromoteOutcome {
    Promoted { user_id: Uuid },
    Conflict,
}

fn parse_role(value: &str) -> Result<Role> {
    Role::parse(value).ok_or_else(|| anyhow!("unknown role in database: {value}"))
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRow> {
    Ok(UserRow {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        telephone: row.get("telephone"),
        password_hash: row.get("password_hash"),
        role: parse_role(row.get("role"))?,
    })
}

/// True when a verified account already holds this email or telephone.
pub(crate) async fn verified_conflict_exists(
    pool: &PgPool,
    email: &str,
    telephone: &str,
) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR telephone = $2) AS exists";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(telephone)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check for existing user")?;
    Ok(row.get("exists"))
}

/// When the last code was sent to this email, if a pending row exists.
pub(crate) async fn pending_last_code_sent_at(
    pool: &PgPool,
    email: &str,
) -> Result<Option<DateTime<Utc>>> {
    let query = "SELECT last_code_sent_at FROM pending_registrations WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up pending registration")?;
    Ok(row.map(|row| row.get("last_code_sent_at")))
}

/// Create or reissue the pending registration for an email.
///
/// Reissue overwrites every field, stamps `last_code_sent_at`, and
/// resets the mistake counter; the email PK guarantees a single row
/// per address even under concurrent registrations.
pub(crate) async fn upsert_pending(pool: &PgPool, pending: &NewPending<'_>) -> Result<()> {
    let query = r"
        INSERT INTO pending_registrations
            (email, name, telephone, password_hash, role, code_hash,
             code_expires_at, last_code_sent_at, mistakes)
        VALUES ($1, $2, $3, $4, $5, $6, NOW() + ($7 * INTERVAL '1 second'), NOW(), 0)
        ON CONFLICT (email) DO UPDATE SET
            name = EXCLUDED.name,
            telephone = EXCLUDED.telephone,
            password_hash = EXCLUDED.password_hash,
            role = EXCLUDED.role,
            code_hash = EXCLUDED.code_hash,
            code_expires_at = EXCLUDED.code_expires_at,
            last_code_sent_at = NOW(),
            mistakes = 0
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(pending.email)
        .bind(pending.name)
        .bind(pending.telephone)
        .bind(pending.password_hash)
        .bind(pending.role.as_str())
        .bind(&pending.code_hash)
        .bind(pending.code_ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to upsert pending registration")?;
    Ok(())
}

/// Find a pending registration matching email + code digest with an
/// unexpired code. Expired rows are treated as absent.
pub(crate) async fn find_pending_match(
    pool: &PgPool,
    email: &str,
    code_hash: &[u8],
) -> Result<Option<PendingRow>> {
    let query = r"
        SELECT email, name, telephone, password_hash, role
        FROM pending_registrations
        WHERE email = $1 AND code_hash = $2 AND code_expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to match verification code")?;

    row.map(|row| {
        Ok(PendingRow {
            email: row.get("email"),
            name: row.get("name"),
            telephone: row.get("telephone"),
            password_hash: row.get("password_hash"),
            role: parse_role(row.get("role"))?,
        })
    })
    .transpose()
}

/// Promote a matched pending registration: insert the verified user
/// and drop the pending row in one transaction.
pub(crate) async fn promote_pending(pool: &PgPool, pending: &PendingRow) -> Result<PromoteOutcome> {
    let mut tx = pool.begin().await.context("begin promote transaction")?;

    let query = r"
        INSERT INTO users (name, email, telephone, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(&pending.name)
        .bind(&pending.email)
        .bind(&pending.telephone)
        .bind(&pending.password_hash)
        .bind(pending.role.as_str())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match inserted {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(PromoteOutcome::Conflict);
            }
            return Err(err).context("failed to insert verified user");
        }
    };

    let query = "DELETE FROM pending_registrations WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(&pending.email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete promoted pending registration")?;

    tx.commit().await.context("commit promote transaction")?;
    Ok(PromoteOutcome::Promoted { user_id })
}

/// Bump the mistake counter for an email, purging the row once the
/// count reaches `max_mistakes`. Returns the new count, or `None` when
/// no pending row exists.
pub(crate) async fn record_mistake(
    pool: &PgPool,
    email: &str,
    max_mistakes: i64,
) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("begin mistake transaction")?;

    let query = r"
        UPDATE pending_registrations
        SET mistakes = mistakes + 1
        WHERE email = $1
        RETURNING mistakes
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to record verification mistake")?;

    let Some(row) = row else {
        tx.commit().await.context("commit mistake transaction")?;
        return Ok(None);
    };
    let mistakes: i32 = row.get("mistakes");
    let mistakes = i64::from(mistakes);

    if mistakes >= max_mistakes {
        let query = "DELETE FROM pending_registrations WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to purge locked-out pending registration")?;
    }

    tx.commit().await.context("commit mistake transaction")?;
    Ok(Some(mistakes))
}

pub(crate) async fn user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
    let query = r"
        SELECT id, name, email, telephone, password_hash, role
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user by email")?;
    row.as_ref().map(user_from_row).transpose()
}

pub(crate) async fn user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>> {
    let query = r"
        SELECT id, name, email, telephone, password_hash, role
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user by id")?;
    row.as_ref().map(user_from_row).transpose()
}

/// Drop pending registrations whose code expired. Stand-in for a
/// store-side TTL index; expired rows are already invisible to
/// [`find_pending_match`].
pub(crate) async fn delete_expired_pending(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM pending_registrations WHERE code_expires_at <= NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep expired pending registrations")?;
    Ok(result.rows_affected())
}
