use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::require_staff;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{hhmm, Blackout, Timeslot, WeeklyRule};
use crate::state::AppState;

// ── Timeslots ──

pub async fn list_timeslots(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Timeslot>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_timeslots(&db, false)?))
}

#[derive(Deserialize)]
pub struct TimeslotInput {
    #[serde(with = "hhmm")]
    pub start_time: chrono::NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: chrono::NaiveTime,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn create_timeslot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<TimeslotInput>,
) -> Result<(StatusCode, Json<Timeslot>), AppError> {
    require_staff(&headers, &state.config.admin_token)?;
    if input.end_time <= input.start_time {
        return Err(AppError::validation("end_time", "End time must be after start time."));
    }

    let db = state.db()?;
    let id = queries::create_timeslot(&db, input.start_time, input.end_time, input.is_active)?
        .ok_or_else(|| AppError::Conflict("This timeslot already exists.".into()))?;
    let slot = queries::get_timeslot(&db, id)?.ok_or_else(|| AppError::NotFound("timeslot".into()))?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn delete_timeslot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    if queries::get_timeslot(&db, id)?.is_none() {
        return Err(AppError::NotFound("timeslot".into()));
    }
    if queries::timeslot_reference_count(&db, id)? > 0 {
        return Err(AppError::Conflict(
            "Timeslot has bookings or series and cannot be deleted.".into(),
        ));
    }
    queries::delete_timeslot(&db, id)?;
    Ok(Json(serde_json::json!({"status": "deleted"})))
}

// ── Weekly Rules ──

pub async fn list_weekly_rules(
    State(state): State<Arc<AppState>>,
    Path(field_id): Path<i64>,
) -> Result<Json<Vec<WeeklyRule>>, AppError> {
    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }
    Ok(Json(queries::list_weekly_rules(&db, field_id)?))
}

#[derive(Deserialize)]
pub struct WeeklyRuleInput {
    pub weekday: u8,
    pub timeslot_id: i64,
    pub is_open: bool,
}

/// Upserts each rule in the body and returns the field's full rule set.
pub async fn put_weekly_rules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(field_id): Path<i64>,
    Json(rules): Json<Vec<WeeklyRuleInput>>,
) -> Result<Json<Vec<WeeklyRule>>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;
    if rules.iter().any(|r| r.weekday > 6) {
        return Err(AppError::validation("weekday", "Weekday must be between 0 (Monday) and 6 (Sunday)."));
    }

    let mut db = state.db()?;
    let tx = db.transaction()?;
    if queries::get_field(&tx, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }
    for rule in &rules {
        if queries::get_timeslot(&tx, rule.timeslot_id)?.is_none() {
            return Err(AppError::NotFound("timeslot".into()));
        }
        queries::upsert_weekly_rule(&tx, field_id, rule.weekday, rule.timeslot_id, rule.is_open)?;
    }
    let all = queries::list_weekly_rules(&tx, field_id)?;
    tx.commit()?;

    tracing::info!(field_id, updated = rules.len(), "weekly rules updated");
    Ok(Json(all))
}

// ── Blackouts ──

pub async fn list_blackouts(
    State(state): State<Arc<AppState>>,
    Path(field_id): Path<i64>,
) -> Result<Json<Vec<Blackout>>, AppError> {
    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }
    Ok(Json(queries::list_blackouts(&db, field_id)?))
}

#[derive(Deserialize)]
pub struct BlackoutInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub timeslot_id: Option<i64>,
    #[serde(default)]
    pub reason: String,
}

pub async fn create_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(field_id): Path<i64>,
    Json(input): Json<BlackoutInput>,
) -> Result<(StatusCode, Json<Blackout>), AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }
    if let Some(slot) = input.timeslot_id {
        if queries::get_timeslot(&db, slot)?.is_none() {
            return Err(AppError::NotFound("timeslot".into()));
        }
    }

    let blackout = queries::create_blackout(&db, field_id, input.date, input.timeslot_id, input.reason.trim())?;
    tracing::info!(field_id, date = %input.date, whole_day = blackout.is_whole_day(), "blackout added");
    Ok((StatusCode::CREATED, Json(blackout)))
}

pub async fn delete_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    if !queries::delete_blackout(&db, id)? {
        return Err(AppError::NotFound("blackout".into()));
    }
    Ok(Json(serde_json::json!({"status": "deleted"})))
}
