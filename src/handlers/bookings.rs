use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::require_staff;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::reservations::{self, DirectBookingRequest};
use crate::state::AppState;

// GET /bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let status = query.status.as_deref().map(BookingStatus::parse);
    let db = state.db()?;
    let bookings = queries::list_bookings(&db, status, query.limit.unwrap_or(50))?;
    Ok(Json(bookings))
}

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DirectBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let mut db = state.db()?;
    let booking = reservations::create_direct_booking(&mut db, &state.config, &req, now)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db()?;
    let booking = queries::get_booking(&db, id)?.ok_or_else(|| AppError::NotFound("booking".into()))?;
    Ok(Json(booking))
}

// PUT /bookings/:id
#[derive(Deserialize)]
pub struct StatusInput {
    pub status: BookingStatus,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Booking>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let mut db = state.db()?;
    let booking = reservations::update_booking_status(&mut db, &state.config, id, input.status, now)?;
    Ok(Json(booking))
}

// DELETE /bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    if !queries::delete_booking(&db, id)? {
        return Err(AppError::NotFound("booking".into()));
    }
    tracing::info!(booking_id = id, "booking deleted");
    Ok(Json(serde_json::json!({"status": "deleted"})))
}

// POST /bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let mut db = state.db()?;
    let booking = reservations::cancel_booking(&mut db, id, now)?;
    Ok(Json(booking))
}
