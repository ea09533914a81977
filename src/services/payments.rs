use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Party, PaymentStatus, Series, SeriesStatus};
use crate::services::gateway::{split_name, CheckoutRequest};
use crate::services::reservations::{self, ReservedSeries, SeriesRequest};
use crate::state::AppState;

const DEFAULT_PAYER_NAME: &str = "Guest";
const DEFAULT_PAYER_EMAIL: &str = "guest@example.com";
const CHECKOUT_TITLE: &str = "Playground Reservation";

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub series: Series,
    pub checkout_url: String,
    pub tx_ref: String,
    pub occurrences: usize,
    pub dates: Vec<NaiveDate>,
    pub amount: i64,
}

/// Result of a gateway callback, serialized as `{"status": "paid" | "not_paid", ...}`.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settlement {
    Paid { approved_bookings: usize },
    NotPaid { gateway: serde_json::Value },
}

/// Name and email shown to the gateway for a party.
fn payer_contact(conn: &Connection, party: &Party) -> anyhow::Result<(String, String)> {
    let (name, email) = match party {
        Party::Guest { name, email, .. } => (name.clone(), email.clone().unwrap_or_default()),
        Party::Registered { user_id } => match queries::get_user(conn, *user_id)? {
            Some(user) => (user.full_name, user.email),
            None => (String::new(), String::new()),
        },
    };

    let name = match name.trim() {
        "" => DEFAULT_PAYER_NAME.to_string(),
        n => n.to_string(),
    };
    let email = match email.trim() {
        "" => DEFAULT_PAYER_EMAIL.to_string(),
        e => e.to_string(),
    };
    Ok((name, email))
}

fn checkout_request(reserved: &ReservedSeries, tx_ref: &str, name: &str, email: &str) -> CheckoutRequest {
    let (first_name, last_name) = split_name(name);
    CheckoutRequest {
        tx_ref: tx_ref.to_string(),
        amount: reserved.series.amount,
        currency: reserved.series.currency.clone(),
        email: email.to_string(),
        first_name,
        last_name,
        title: CHECKOUT_TITLE.to_string(),
        description: format!(
            "{} · {} · {} month(s)",
            reserved.field.name,
            reserved.timeslot.label(),
            reserved.series.months
        ),
    }
}

/// Holds the package occurrences, then opens a checkout with the gateway.
/// A gateway failure leaves the hold in place to expire on its own.
pub async fn start_checkout(
    state: &AppState,
    req: &SeriesRequest,
    now: NaiveDateTime,
) -> Result<CheckoutOutcome, AppError> {
    let (reserved, tx_ref, request) = {
        let mut db = state.db()?;
        let reserved = reservations::reserve_series(&mut db, &state.config, req, now)?;
        let tx_ref = reserved
            .series
            .tx_ref
            .clone()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("pending series has no tx_ref")))?;
        let (name, email) = payer_contact(&db, &reserved.series.party)?;
        let request = checkout_request(&reserved, &tx_ref, &name, &email);
        (reserved, tx_ref, request)
    };

    let checkout_url = state.gateway.initialize(&request).await.map_err(|e| {
        tracing::warn!(tx_ref = %tx_ref, error = %e, "checkout initialization failed");
        AppError::Gateway(format!("{e:#}"))
    })?;

    let series = {
        let db = state.db()?;
        queries::set_series_checkout_url(&db, reserved.series.id, &checkout_url, now)?;
        queries::set_payment_checkout_url(&db, reserved.payment_id, &checkout_url, now)?;
        queries::get_series(&db, reserved.series.id)?.ok_or_else(|| AppError::NotFound("series".into()))?
    };

    tracing::info!(tx_ref = %tx_ref, series_id = series.id, "checkout started");

    Ok(CheckoutOutcome {
        amount: series.amount,
        occurrences: reserved.occurrences.len(),
        dates: reserved.occurrences,
        series,
        checkout_url,
        tx_ref,
    })
}

/// Verifies `tx_ref` with the gateway and settles it when paid.
pub async fn settle_callback(state: &AppState, tx_ref: &str, now: NaiveDateTime) -> Result<Settlement, AppError> {
    let verification = state.gateway.verify(tx_ref).await.map_err(|e| {
        tracing::warn!(tx_ref = %tx_ref, error = %e, "payment verification failed");
        AppError::Gateway(format!("{e:#}"))
    })?;

    if !verification.paid {
        tracing::info!(tx_ref = %tx_ref, "payment not confirmed by gateway");
        return Ok(Settlement::NotPaid {
            gateway: verification.payload,
        });
    }

    let mut db = state.db()?;
    apply_verified_payment(&mut db, tx_ref, &verification.payload, state.config.hold_ttl(), now)
}

/// Marks a verified payment paid and approves its fresh holds in one write
/// transaction. Safe to repeat: a second call changes nothing.
pub fn apply_verified_payment(
    conn: &mut Connection,
    tx_ref: &str,
    payload: &serde_json::Value,
    hold_ttl: Duration,
    now: NaiveDateTime,
) -> Result<Settlement, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let payment = queries::get_payment_by_tx_ref(&tx, tx_ref)?.ok_or_else(|| AppError::NotFound("payment".into()))?;
    if payment.status != PaymentStatus::Paid {
        queries::mark_payment_paid(&tx, payment.id, payload, now)?;
    }

    if let Some(series) = queries::get_series(&tx, payment.series_id)? {
        if series.status != SeriesStatus::Approved {
            queries::set_series_status(&tx, series.id, SeriesStatus::Approved, now)?;
        }
    }

    let fresh = queries::fresh_pending_ids_for_tx_ref(&tx, tx_ref, now - hold_ttl)?;
    for id in &fresh {
        queries::set_booking_status(&tx, *id, BookingStatus::Approved, now)?;
    }

    tx.commit()?;

    tracing::info!(tx_ref = %tx_ref, approved = fresh.len(), "payment settled");
    Ok(Settlement::Paid {
        approved_bookings: fresh.len(),
    })
}
