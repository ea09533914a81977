pub mod availability;
pub mod bookings;
pub mod fields;
pub mod health;
pub mod payments;
pub mod reports;
pub mod schedule;
pub mod series;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::errors::AppError;
use crate::state::AppState;

/// Staff endpoints expect `Authorization: Bearer <ADMIN_TOKEN>`.
pub fn require_staff(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/series/start-checkout", post(series::start_checkout))
        .route("/series", get(series::list_series))
        .route("/series/:id", get(series::get_series))
        .route("/series/:id/cancel", post(series::cancel_series))
        .route(
            "/payments/gateway/callback",
            get(payments::gateway_callback).post(payments::gateway_callback),
        )
        .route("/payments", get(payments::list_payments))
        .route("/payments/:id", get(payments::get_payment))
        .route("/availability", get(availability::day_availability))
        .route("/availability/available-map", get(availability::available_map))
        .route("/availability/booked-map", get(availability::booked_map))
        .route("/availability/by-type", get(availability::available_by_type))
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/fields", get(fields::list_fields).post(fields::create_field))
        .route(
            "/fields/:id",
            get(fields::get_field)
                .put(fields::update_field)
                .delete(fields::delete_field),
        )
        .route(
            "/fields/:id/weekly-rules",
            get(schedule::list_weekly_rules).put(schedule::put_weekly_rules),
        )
        .route(
            "/fields/:id/blackouts",
            get(schedule::list_blackouts).post(schedule::create_blackout),
        )
        .route("/blackouts/:id", delete(schedule::delete_blackout))
        .route(
            "/timeslots",
            get(schedule::list_timeslots).post(schedule::create_timeslot),
        )
        .route("/timeslots/:id", delete(schedule::delete_timeslot))
        .route("/reports/stats", get(reports::stats))
        .route("/reports/revenue", get(reports::revenue))
        .route("/reports/activity", get(reports::activity))
        .with_state(state)
}
