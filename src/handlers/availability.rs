use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::db::{queries, DATE_FORMAT};
use crate::errors::AppError;
use crate::models::SportType;
use crate::services::availability::{self, Resolver, SlotView};
use crate::services::calendar::month_bounds;
use crate::state::AppState;

// GET /availability?field_id=&date=
#[derive(Deserialize)]
pub struct DayQuery {
    pub field_id: Option<i64>,
    pub date: Option<String>,
}

pub async fn day_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    let field_id = query
        .field_id
        .ok_or_else(|| AppError::validation("field_id", "date and field_id are required"))?;
    let date = query
        .date
        .as_deref()
        .ok_or_else(|| AppError::validation("date", "date and field_id are required"))
        .and_then(|raw| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| AppError::validation("date", "Invalid date, expected YYYY-MM-DD."))
        })?;

    let now = Utc::now().naive_utc();
    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }

    let resolver = Resolver::new(&db, state.config.always_open_slots, state.config.hold_ttl(), now);
    Ok(Json(availability::day_slots(&resolver, field_id, date)?))
}

// GET /availability/available-map, /availability/booked-map
#[derive(Deserialize)]
pub struct MonthQuery {
    pub field_id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub only_future: Option<String>,
}

/// Past days are hidden unless `only_future=0`.
fn only_future_from(raw: Option<&str>, today: NaiveDate) -> Option<NaiveDate> {
    match raw.map(str::trim) {
        Some("0") | Some("false") => None,
        _ => Some(today),
    }
}

fn month_params(year: Option<i32>, month: Option<u32>) -> Result<(i32, u32), AppError> {
    match (year, month) {
        (Some(y), Some(m)) if (1..=12).contains(&m) => {
            if month_bounds(y, m).is_none() {
                return Err(AppError::validation("year", "Year is out of range."));
            }
            Ok((y, m))
        }
        _ => Err(AppError::validation("month", "Provide valid field_id, year, month")),
    }
}

pub async fn available_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let field_id = query
        .field_id
        .ok_or_else(|| AppError::validation("field_id", "Provide valid field_id, year, month"))?;
    let (year, month) = month_params(query.year, query.month)?;

    let now = Utc::now().naive_utc();
    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }

    let resolver = Resolver::new(&db, state.config.always_open_slots, state.config.hold_ttl(), now);
    let from = only_future_from(query.only_future.as_deref(), now.date());
    let map = availability::available_map(&resolver, field_id, year, month, from)?;
    Ok(Json(serde_json::json!({ "available": map })))
}

pub async fn booked_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let field_id = query
        .field_id
        .ok_or_else(|| AppError::validation("field_id", "Provide valid field_id, year, month"))?;
    let (year, month) = month_params(query.year, query.month)?;

    let today = Utc::now().date_naive();
    let db = state.db()?;
    if queries::get_field(&db, field_id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }

    let from = only_future_from(query.only_future.as_deref(), today);
    let map = availability::booked_map(&db, field_id, year, month, from)?;
    Ok(Json(serde_json::json!({ "booked": map })))
}

// GET /availability/by-type?type=&year=&month=
#[derive(Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub sport_type: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub only_future: Option<String>,
}

pub async fn available_by_type(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (year, month) = month_params(query.year, query.month)?;
    let Some(sport) = query.sport_type.as_deref().and_then(SportType::parse) else {
        return Ok(Json(serde_json::json!({ "available": {} })));
    };

    let now = Utc::now().naive_utc();
    let db = state.db()?;
    let resolver = Resolver::new(&db, state.config.always_open_slots, state.config.hold_ttl(), now);
    let from = only_future_from(query.only_future.as_deref(), now.date());
    let map = availability::available_by_type(&resolver, sport, year, month, from)?;
    Ok(Json(serde_json::json!({ "available": map })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_future_defaults_on() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert_eq!(only_future_from(None, today), Some(today));
        assert_eq!(only_future_from(Some("1"), today), Some(today));
        assert_eq!(only_future_from(Some("0"), today), None);
    }

    #[test]
    fn test_month_params() {
        assert_eq!(month_params(Some(2025), Some(6)).unwrap(), (2025, 6));
        assert!(month_params(Some(2025), Some(13)).is_err());
        assert!(month_params(None, Some(1)).is_err());
        assert!(matches!(
            month_params(Some(300_000), Some(1)),
            Err(AppError::Validation { field: "year", .. })
        ));
    }
}
