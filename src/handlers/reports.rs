use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::require_staff;
use crate::errors::AppError;
use crate::services::reporting::{self, Activity, BookingStats, Revenue};
use crate::state::AppState;

const RECENT_ACTIVITY_LIMIT: i64 = 5;

pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<BookingStats>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let today = Utc::now().date_naive();
    let db = state.db()?;
    Ok(Json(reporting::booking_stats(&db, today)?))
}

#[derive(Deserialize)]
pub struct RevenueQuery {
    pub month: Option<String>,
}

pub async fn revenue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Revenue>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let month = query
        .month
        .ok_or_else(|| AppError::validation("month", "month parameter required (YYYY-MM)"))?;
    let db = state.db()?;
    Ok(Json(reporting::revenue(&db, &month, &state.config.currency)?))
}

pub async fn activity(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Vec<Activity>>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(reporting::recent_activity(&db, RECENT_ACTIVITY_LIMIT)?))
}
