use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::require_staff;
use crate::db::queries::{self, PaymentFilter};
use crate::db::DATE_FORMAT;
use crate::errors::AppError;
use crate::models::{Payment, PaymentStatus};
use crate::services::payments::{self, Settlement};
use crate::state::AppState;

// GET|POST /payments/gateway/callback
#[derive(Deserialize)]
pub struct CallbackParams {
    pub tx_ref: Option<String>,
}

/// The reference may arrive as a JSON body or as `?tx_ref=`.
fn callback_tx_ref(query: CallbackParams, body: &[u8]) -> Option<String> {
    let from_body = serde_json::from_slice::<CallbackParams>(body)
        .ok()
        .and_then(|p| p.tx_ref);
    from_body
        .or(query.tx_ref)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

pub async fn gateway_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackParams>,
    body: Bytes,
) -> Result<Json<Settlement>, AppError> {
    let tx_ref =
        callback_tx_ref(query, &body).ok_or_else(|| AppError::validation("tx_ref", "tx_ref is required"))?;

    let now = Utc::now().naive_utc();
    let settlement = payments::settle_callback(&state, &tx_ref, now).await?;
    Ok(Json(settlement))
}

// GET /payments?q=&status=&date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct PaymentsQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let created_on = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| AppError::validation("date", "Invalid date, expected YYYY-MM-DD."))?,
        ),
        None => None,
    };

    // Unknown statuses are ignored rather than rejected.
    let filter = PaymentFilter {
        search: query.q,
        status: query.status.as_deref().and_then(PaymentStatus::parse),
        created_on,
    };

    let db = state.db()?;
    let payments = queries::list_payments(&db, &filter, query.limit.unwrap_or(100))?;
    Ok(Json(payments))
}

// GET /payments/:id
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Payment>, AppError> {
    require_staff(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    let payment = queries::get_payment(&db, id)?.ok_or_else(|| AppError::NotFound("payment".into()))?;
    Ok(Json(payment))
}
