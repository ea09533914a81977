use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::require_staff;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Field, FieldInput};
use crate::state::AppState;

fn validate(input: &FieldInput) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|(field, message)| AppError::validation(field, message))
}

// GET /fields?active=
#[derive(Deserialize)]
pub struct FieldsQuery {
    pub active: Option<bool>,
}

pub async fn list_fields(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FieldsQuery>,
) -> Result<Json<Vec<Field>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_fields(&db, query.active)?))
}

pub async fn get_field(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<Field>, AppError> {
    let db = state.db()?;
    let field = queries::get_field(&db, id)?.ok_or_else(|| AppError::NotFound("field".into()))?;
    Ok(Json(field))
}

// POST /fields
pub async fn create_field(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<FieldInput>,
) -> Result<(StatusCode, Json<Field>), AppError> {
    require_staff(&headers, &state.config.admin_token)?;
    validate(&input)?;

    let db = state.db()?;
    let id = queries::create_field(&db, &input)?
        .ok_or_else(|| AppError::Conflict("A field with this name already exists.".into()))?;
    let field = queries::get_field(&db, id)?.ok_or_else(|| AppError::NotFound("field".into()))?;

    tracing::info!(field_id = id, name = %field.name, "field created");
    Ok((StatusCode::CREATED, Json(field)))
}

// PUT /fields/:id
pub async fn update_field(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<FieldInput>,
) -> Result<Json<Field>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;
    validate(&input)?;

    let db = state.db()?;
    match queries::update_field(&db, id, &input)? {
        None => return Err(AppError::Conflict("A field with this name already exists.".into())),
        Some(false) => return Err(AppError::NotFound("field".into())),
        Some(true) => {}
    }
    let field = queries::get_field(&db, id)?.ok_or_else(|| AppError::NotFound("field".into()))?;
    Ok(Json(field))
}

// DELETE /fields/:id
pub async fn delete_field(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    if queries::get_field(&db, id)?.is_none() {
        return Err(AppError::NotFound("field".into()));
    }
    if queries::field_reference_count(&db, id)? > 0 {
        return Err(AppError::Conflict(
            "Field has bookings or series and cannot be deleted.".into(),
        ));
    }
    queries::delete_field(&db, id)?;

    tracing::info!(field_id = id, "field deleted");
    Ok(Json(serde_json::json!({"status": "deleted"})))
}
