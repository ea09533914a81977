use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::require_staff;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Payment, Series};
use crate::services::payments::{self, CheckoutOutcome};
use crate::services::reservations::{self, SeriesRequest};
use crate::state::AppState;

// POST /series/start-checkout
pub async fn start_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SeriesRequest>,
) -> Result<Json<CheckoutOutcome>, AppError> {
    let now = Utc::now().naive_utc();
    let outcome = payments::start_checkout(&state, &req, now).await?;
    Ok(Json(outcome))
}

// GET /series
#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list_series(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Series>>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    let series = queries::list_series(&db, query.limit.unwrap_or(50))?;
    Ok(Json(series))
}

// GET /series/:id
#[derive(Serialize)]
pub struct SeriesDetail {
    #[serde(flatten)]
    series: Series,
    bookings: Vec<Booking>,
    payment: Option<Payment>,
}

pub async fn get_series(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SeriesDetail>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    let series = queries::get_series(&db, id)?.ok_or_else(|| AppError::NotFound("series".into()))?;
    let bookings = queries::bookings_for_series(&db, id)?;
    let payment = queries::get_payment_for_series(&db, id)?;

    Ok(Json(SeriesDetail {
        series,
        bookings,
        payment,
    }))
}

// POST /series/:id/cancel
pub async fn cancel_series(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Series>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let mut db = state.db()?;
    let series = reservations::cancel_series(&mut db, id, now)?;
    Ok(Json(series))
}
