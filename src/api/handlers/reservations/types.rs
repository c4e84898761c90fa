//! Request/response types for reservation endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::storage::{ReservationDetail, ReservationRow, ShopRow};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateReservationRequest {
    #[serde(rename = "apptDate")]
    pub appt_date: Option<String>,
    #[serde(rename = "apptTime")]
    pub appt_time: Option<String>,
    #[serde(rename = "massageShop")]
    pub massage_shop: Option<Uuid>,
    /// Target owner; admins may book for any user, everyone else only
    /// for themselves.
    pub user: Option<Uuid>,
}

/// Partial update; absent fields keep their stored value.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateReservationRequest {
    #[serde(rename = "apptDate")]
    pub appt_date: Option<String>,
    #[serde(rename = "apptTime")]
    pub appt_time: Option<String>,
    #[serde(rename = "massageShop")]
    pub massage_shop: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ShopSummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub telephone: String,
    #[serde(rename = "openTime")]
    pub open_time: String,
    #[serde(rename = "closeTime")]
    pub close_time: String,
}

impl From<ShopRow> for ShopSummary {
    fn from(shop: ShopRow) -> Self {
        Self {
            id: shop.id,
            name: shop.name,
            address: shop.address,
            telephone: shop.telephone,
            open_time: shop.open_time,
            close_time: shop.close_time,
        }
    }
}

/// Owner details attached to admin views.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReservationData {
    pub id: Uuid,
    #[serde(rename = "apptDate")]
    pub appt_date: String,
    #[serde(rename = "apptTime")]
    pub appt_time: String,
    pub user: Uuid,
    #[serde(rename = "massageShop")]
    pub massage_shop: ShopSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerSummary>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ReservationData {
    /// Build the wire shape from a joined row, attaching the owner
    /// block only for admin callers.
    pub(crate) fn from_detail(detail: ReservationDetail, include_owner: bool) -> Self {
        let owner = include_owner.then(|| OwnerSummary {
            id: detail.user_id,
            name: detail.user_name,
            email: detail.user_email,
        });
        Self {
            id: detail.id,
            appt_date: detail.appt_date,
            appt_time: detail.appt_time,
            user: detail.user_id,
            massage_shop: ShopSummary::from(detail.shop),
            owner,
            created_at: detail.created_at,
        }
    }

    /// Build the wire shape from a freshly written row and its shop.
    pub(crate) fn from_parts(row: ReservationRow, shop: ShopRow) -> Self {
        Self {
            id: row.id,
            appt_date: row.appt_date,
            appt_time: row.appt_time,
            user: row.user_id,
            massage_shop: ShopSummary::from(shop),
            owner: None,
            created_at: row.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReservationResponse {
    pub success: bool,
    pub data: ReservationData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReservationListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<ReservationData>,
}
