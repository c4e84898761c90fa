//! Reservation endpoints: list, fetch, create, update, cancel.
//!
//! Every route requires a verified session. Ownership rules: users see
//! and touch only their own reservations, admins see and touch all of
//! them and may book on another user's behalf.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::auth::session::authenticate;
use crate::api::handlers::auth::storage as users;
use crate::api::handlers::auth::AuthConfig;

use super::policy;
use super::storage::{self, CreateOutcome, NewReservation, ReservationRow};
use super::types::{
    CreateReservationRequest, ReservationData, ReservationListResponse, ReservationResponse,
    UpdateReservationRequest,
};

/// Reservations a non-admin may hold at once.
pub(crate) const RESERVATION_QUOTA: i64 = 3;

#[utoipa::path(
    get,
    path = "/api/v1/reservation",
    responses(
        (status = 200, description = "Caller's reservations, or all of them for admins", body = ReservationListResponse),
        (status = 401, description = "Missing or invalid credentials", body = crate::api::handlers::auth::types::MessageResponse)
    ),
    tag = "reservations"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&headers, &pool, &config).await?;

    let fetched = if actor.role.is_admin() {
        storage::list_all(&pool).await
    } else {
        storage::list_for_user(&pool, actor.id).await
    };
    let details = match fetched {
        Ok(details) => details,
        Err(err) => return Err(ApiError::internal(err, "Cannot find reservations")),
    };

    let include_owner = actor.role.is_admin();
    let data: Vec<ReservationData> = details
        .into_iter()
        .map(|detail| ReservationData::from_detail(detail, include_owner))
        .collect();
    Ok(Json(ReservationListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservation/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation with its shop attached", body = ReservationResponse),
        (status = 403, description = "Reservation belongs to someone else", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 404, description = "No such reservation", body = crate::api::handlers::auth::types::MessageResponse)
    ),
    tag = "reservations"
)]
pub async fn get_by_id(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&headers, &pool, &config).await?;

    let detail = match storage::detail_by_id(&pool, id).await {
        Ok(Some(detail)) => detail,
        Ok(None) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot find reservation")),
    };
    if detail.user_id != actor.id && !actor.role.is_admin() {
        return Err(ApiError::Forbidden(format!(
            "User {} is not authorized to view this reservation",
            actor.id
        )));
    }

    Ok(Json(ReservationResponse {
        success: true,
        data: ReservationData::from_detail(detail, actor.role.is_admin()),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservation",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Validation or policy failure", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 403, description = "Booking for another user without admin role", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 404, description = "Unknown shop or target user", body = crate::api::handlers::auth::types::MessageResponse)
    ),
    tag = "reservations"
)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    payload: Option<Json<CreateReservationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&headers, &pool, &config).await?;
    let request = match payload {
        Some(Json(payload)) => payload,
        None => {
            return Err(ApiError::Validation(
                "Please add appointment date, appointment time, and massage shop".to_string(),
            ))
        }
    };

    let owner_id = request.user.unwrap_or(actor.id);
    if owner_id != actor.id {
        if !actor.role.is_admin() {
            return Err(ApiError::Forbidden(format!(
                "User {} is not authorized to create a reservation for another user",
                actor.id
            )));
        }
        match users::user_by_id(&pool, owner_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ApiError::NotFound("User".to_string())),
            Err(err) => return Err(ApiError::internal(err, "Cannot create reservation")),
        }
    }

    let Some(shop_id) = request.massage_shop else {
        return Err(ApiError::Validation(
            "Please add a massage shop".to_string(),
        ));
    };
    let Some(appt_date) = request.appt_date.filter(|date| !date.is_empty()) else {
        return Err(ApiError::Validation(
            "Please add an appointment date".to_string(),
        ));
    };
    let Some(appt_time) = request.appt_time.filter(|time| !time.is_empty()) else {
        return Err(ApiError::Validation(
            "Please add an appointment time".to_string(),
        ));
    };

    let shop = match storage::shop_by_id(&pool, shop_id).await {
        Ok(Some(shop)) => shop,
        Ok(None) => return Err(ApiError::NotFound("Massage shop".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot create reservation")),
    };

    if !policy::valid_date(&appt_date) {
        return Err(ApiError::InvalidDateFormat);
    }
    if !policy::valid_time_of_day(&appt_time) {
        return Err(ApiError::InvalidTimeFormat);
    }
    if policy::is_past(&appt_date, &appt_time) {
        return Err(ApiError::PastAppointment);
    }
    if !policy::within_operating_hours(&appt_time, &shop.open_time, &shop.close_time) {
        return Err(ApiError::OutsideOperatingHours {
            open: shop.open_time.clone(),
            close: shop.close_time.clone(),
        });
    }

    // Admins are exempt from the quota even when booking for a user.
    let quota = (!actor.role.is_admin()).then_some(RESERVATION_QUOTA);
    let new_reservation = NewReservation {
        appt_date: &appt_date,
        appt_time: &appt_time,
        user_id: owner_id,
        shop_id,
    };
    let row: ReservationRow = match storage::create_reservation(&pool, &new_reservation, quota)
        .await
    {
        Ok(CreateOutcome::Created(row)) => row,
        Ok(CreateOutcome::QuotaExceeded) => {
            return Err(ApiError::QuotaExceeded { user_id: owner_id })
        }
        Err(err) => return Err(ApiError::internal(err, "Cannot create reservation")),
    };

    debug!(reservation = %row.id, owner = %owner_id, "reservation created");
    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse {
            success: true,
            data: ReservationData::from_parts(row, shop),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/reservation/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    request_body = UpdateReservationRequest,
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 400, description = "Validation or policy failure", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 403, description = "Not the owner, or reassigning without admin role", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 404, description = "Unknown reservation, shop, or target user", body = crate::api::handlers::auth::types::MessageResponse)
    ),
    tag = "reservations"
)]
pub async fn update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateReservationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&headers, &pool, &config).await?;
    let patch = payload.map_or_else(UpdateReservationRequest::default, |Json(patch)| patch);

    let existing = match storage::reservation_by_id(&pool, id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot update reservation")),
    };
    if existing.user_id != actor.id && !actor.role.is_admin() {
        return Err(ApiError::Forbidden(format!(
            "User {} is not authorized to update this reservation",
            actor.id
        )));
    }

    let owner_id = patch.user.unwrap_or(existing.user_id);
    if owner_id != existing.user_id {
        if !actor.role.is_admin() {
            return Err(ApiError::Forbidden(format!(
                "User {} is not authorized to reassign this reservation",
                actor.id
            )));
        }
        match users::user_by_id(&pool, owner_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ApiError::NotFound("User".to_string())),
            Err(err) => return Err(ApiError::internal(err, "Cannot update reservation")),
        }
    }

    let reschedules = patch.appt_date.is_some()
        || patch.appt_time.is_some()
        || patch.massage_shop.is_some();
    let appt_date = patch.appt_date.unwrap_or_else(|| existing.appt_date.clone());
    let appt_time = patch.appt_time.unwrap_or_else(|| existing.appt_time.clone());
    let shop_id = patch.massage_shop.unwrap_or(existing.shop_id);

    if reschedules {
        if !policy::valid_date(&appt_date) {
            return Err(ApiError::InvalidDateFormat);
        }
        if !policy::valid_time_of_day(&appt_time) {
            return Err(ApiError::InvalidTimeFormat);
        }
        let shop = match storage::shop_by_id(&pool, shop_id).await {
            Ok(Some(shop)) => shop,
            Ok(None) => return Err(ApiError::NotFound("Massage shop".to_string())),
            Err(err) => return Err(ApiError::internal(err, "Cannot update reservation")),
        };
        if !policy::within_operating_hours(&appt_time, &shop.open_time, &shop.close_time) {
            return Err(ApiError::OutsideOperatingHours {
                open: shop.open_time,
                close: shop.close_time,
            });
        }
        // The window is measured against the slot being given up, not
        // the one being requested.
        if !policy::cancellable_now(&existing.appt_date, &existing.appt_time) {
            return Err(ApiError::CancellationWindowViolated { action: "changed" });
        }
    }

    let updated = NewReservation {
        appt_date: &appt_date,
        appt_time: &appt_time,
        user_id: owner_id,
        shop_id,
    };
    match storage::update_reservation(&pool, id, &updated).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot update reservation")),
    }

    let detail = match storage::detail_by_id(&pool, id).await {
        Ok(Some(detail)) => detail,
        Ok(None) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot update reservation")),
    };
    Ok(Json(ReservationResponse {
        success: true,
        data: ReservationData::from_detail(detail, actor.role.is_admin()),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reservation/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation cancelled", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 400, description = "Inside the cancellation window", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 403, description = "Reservation belongs to someone else", body = crate::api::handlers::auth::types::MessageResponse),
        (status = 404, description = "No such reservation", body = crate::api::handlers::auth::types::MessageResponse)
    ),
    tag = "reservations"
)]
pub async fn delete(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<AuthConfig>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authenticate(&headers, &pool, &config).await?;

    let existing = match storage::reservation_by_id(&pool, id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot delete reservation")),
    };
    if existing.user_id != actor.id && !actor.role.is_admin() {
        return Err(ApiError::Forbidden(format!(
            "User {} is not authorized to delete this reservation",
            actor.id
        )));
    }
    if !policy::cancellable_now(&existing.appt_date, &existing.appt_time) {
        return Err(ApiError::CancellationWindowViolated {
            action: "cancelled",
        });
    }

    match storage::delete_reservation(&pool, id).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound("Reservation".to_string())),
        Err(err) => return Err(ApiError::internal(err, "Cannot delete reservation")),
    }

    debug!(reservation = %id, "reservation cancelled");
    Ok(Json(json!({"success": true, "data": {}})))
}
