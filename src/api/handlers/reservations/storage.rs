//! Database helpers for massage shops and reservations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Columns selected by every joined reservation query.
const DETAIL_COLUMNS: &str = r"
    r.id, r.appt_date, r.appt_time, r.user_id, r.created_at,
    s.id AS shop_id, s.name AS shop_name, s.address AS shop_address,
    s.telephone AS shop_telephone, s.open_time, s.close_time,
    u.name AS user_name, u.email AS user_email
";

pub(crate) struct ShopRow {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) address: String,
    pub(crate) telephone: String,
    pub(crate) open_time: String,
    pub(crate) close_time: String,
}

/// A bare reservation row, as stored.
pub(crate) struct ReservationRow {
    pub(crate) id: Uuid,
    pub(crate) appt_date: String,
    pub(crate) appt_time: String,
    pub(crate) user_id: Uuid,
    pub(crate) shop_id: Uuid,
    pub(crate) created_at: DateTime<Utc>,
}

/// A reservation joined with its shop and owner, ready for rendering.
pub(crate) struct ReservationDetail {
    pub(crate) id: Uuid,
    pub(crate) appt_date: String,
    pub(crate) appt_time: String,
    pub(crate) user_id: Uuid,
    pub(crate) user_name: String,
    pub(crate) user_email: String,
    pub(crate) shop: ShopRow,
    pub(crate) created_at: DateTime<Utc>,
}

/// Outcome of an insert attempted under the per-user quota.
pub(crate) enum CreateOutcome {
    Created(ReservationRow),
    QuotaExceeded,
}

/// Fields written on create; `None` patch fields are resolved by the
/// handler before this point.
pub(crate) struct NewReservation<'a> {
    pub(crate) appt_date: &'a str,
    pub(crate) appt_time: &'a str,
    pub(crate) user_id: Uuid,
    pub(crate) shop_id: Uuid,
}

fn reservation_from_row(row: &sqlx::postgres::PgRow) -> ReservationRow {
    ReservationRow {
        id: row.get("id"),
        appt_date: row.get("appt_date"),
        appt_time: row.get("appt_time"),
        user_id: row.get("user_id"),
        shop_id: row.get("shop_id"),
        created_at: row.get("created_at"),
    }
}

fn detail_from_row(row: &sqlx::postgres::PgRow) -> ReservationDetail {
    ReservationDetail {
        id: row.get("id"),
        appt_date: row.get("appt_date"),
        appt_time: row.get("appt_time"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        user_email: row.get("user_email"),
        shop: ShopRow {
            id: row.get("shop_id"),
            name: row.get("shop_name"),
            address: row.get("shop_address"),
            telephone: row.get("shop_telephone"),
            open_time: row.get("open_time"),
            close_time: row.get("close_time"),
        },
        created_at: row.get("created_at"),
    }
}

pub(crate) async fn shop_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ShopRow>> {
    let query = r"
        SELECT id, name, address, telephone, open_time, close_time
        FROM massage_shops
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
        .context("failed to look up massage shop")?;
    Ok(row.map(|row| ShopRow {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        telephone: row.get("telephone"),
        open_time: row.get("open_time"),
        close_time: row.get("close_time"),
    }))
}

pub(crate) async fn reservation_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ReservationRow>> {
    let query = r"
        SELECT id, appt_date, appt_time, user_id, shop_id, created_at
        FROM reservations
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
        .context("failed to look up reservation")?;
    Ok(row.as_ref().map(reservation_from_row))
}

pub(crate) async fn detail_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ReservationDetail>> {
    let query = format!(
        r"
        SELECT {DETAIL_COLUMNS}
        FROM reservations r
        JOIN massage_shops s ON s.id = r.shop_id
        JOIN users u ON u.id = r.user_id
        WHERE r.id = $1
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load reservation detail")?;
    Ok(row.as_ref().map(detail_from_row))
}

/// All reservations owned by one user, oldest first.
pub(crate) async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ReservationDetail>> {
    let query = format!(
        r"
        SELECT {DETAIL_COLUMNS}
        FROM reservations r
        JOIN massage_shops s ON s.id = r.shop_id
        JOIN users u ON u.id = r.user_id
        WHERE r.user_id = $1
        ORDER BY r.created_at
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list reservations for user")?;
    Ok(rows.iter().map(detail_from_row).collect())
}

/// Every reservation in the system, oldest first. Admin view.
pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<ReservationDetail>> {
    let query = format!(
        r"
        SELECT {DETAIL_COLUMNS}
        FROM reservations r
        JOIN massage_shops s ON s.id = r.shop_id
        JOIN users u ON u.id = r.user_id
        ORDER BY r.created_at
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list all reservations")?;
    Ok(rows.iter().map(detail_from_row).collect())
}

/// Insert a reservation, optionally enforcing the 3-per-user quota.
///
/// The count and insert run inside one transaction holding a
/// transaction-scoped advisory lock on the owner id, so two concurrent
/// requests for the same owner cannot both read 2 and insert a fourth
/// row.
pub(crate) async fn create_reservation(
    pool: &PgPool,
    reservation: &NewReservation<'_>,
    quota: Option<i64>,
) -> Result<CreateOutcome> {
    let mut tx = pool.begin().await.context("begin reservation transaction")?;

    if let Some(quota) = quota {
        let query = "SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(reservation.user_id.to_string())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to take reservation quota lock")?;

        let query = "SELECT COUNT(*) AS total FROM reservations WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(reservation.user_id)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to count reservations for quota")?;
        let total: i64 = row.get("total");
        if total >= quota {
            let _ = tx.rollback().await;
            return Ok(CreateOutcome::QuotaExceeded);
        }
    }

    let query = r"
        INSERT INTO reservations (appt_date, appt_time, user_id, shop_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, appt_date, appt_time, user_id, shop_id, created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(reservation.appt_date)
        .bind(reservation.appt_time)
        .bind(reservation.user_id)
        .bind(reservation.shop_id)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert reservation")?;

    tx.commit().await.context("commit reservation transaction")?;
    Ok(CreateOutcome::Created(reservation_from_row(&row)))
}

/// Overwrite every mutable field; the handler resolves patch defaults
/// beforehand. Returns `false` when the row vanished in the meantime.
pub(crate) async fn update_reservation(
    pool: &PgPool,
    id: Uuid,
    reservation: &NewReservation<'_>,
) -> Result<bool> {
    let query = r"
        UPDATE reservations
        SET appt_date = $2, appt_time = $3, user_id = $4, shop_id = $5
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(reservation.appt_date)
        .bind(reservation.appt_time)
        .bind(reservation.user_id)
        .bind(reservation.shop_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update reservation")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_reservation(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM reservations WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete reservation")?;
    Ok(result.rows_affected() > 0)
}
