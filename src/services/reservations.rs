use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::availability::{weekday_index, weekday_name};
use crate::models::{
    Booking, BookingStatus, Field, NewBooking, NewSeries, PackageLength, Party, PaymentStatus,
    Series, SeriesStatus, Timeslot,
};
use crate::services::availability::Resolver;
use crate::services::calendar::{add_months, weekly_dates};

/// Prefix of every payment reference handed to the gateway.
pub const TX_REF_PREFIX: &str = "FIELDBOOK-";

pub fn tx_ref_for(group_key: &str) -> String {
    format!("{TX_REF_PREFIX}{group_key}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesRequest {
    pub field_id: i64,
    pub timeslot_id: i64,
    pub start_date: NaiveDate,
    pub months: u32,
    /// Monday = 0. Derived from `start_date` when absent.
    #[serde(default)]
    pub weekday: Option<u8>,
    pub party: Party,
}

/// Result of the transactional part of a series checkout.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedSeries {
    pub series: Series,
    pub field: Field,
    pub timeslot: Timeslot,
    pub payment_id: i64,
    pub occurrences: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectBookingRequest {
    pub field_id: i64,
    pub timeslot_id: i64,
    pub date: NaiveDate,
    pub party: Party,
}

fn check_party(conn: &Connection, party: &Party) -> Result<(), AppError> {
    match party {
        Party::Registered { user_id } => {
            if queries::get_user(conn, *user_id)?.is_none() {
                return Err(AppError::NotFound("user".into()));
            }
        }
        Party::Guest { name, .. } => {
            if name.trim().is_empty() {
                return Err(AppError::validation("guest_name", "Guest name is required."));
            }
        }
    }
    Ok(())
}

fn load_field_and_slot(conn: &Connection, field_id: i64, timeslot_id: i64) -> Result<(Field, Timeslot), AppError> {
    let field = queries::get_field(conn, field_id)?.ok_or_else(|| AppError::NotFound("field".into()))?;
    let slot = queries::get_timeslot(conn, timeslot_id)?.ok_or_else(|| AppError::NotFound("timeslot".into()))?;
    Ok((field, slot))
}

fn start_date_out_of_range() -> AppError {
    AppError::validation("start_date", "Start date is too far in the future.")
}

/// Validates a package request and returns its length and weekday.
pub fn validate_series_request(req: &SeriesRequest, today: NaiveDate) -> Result<(PackageLength, u8), AppError> {
    let months = PackageLength::try_from(req.months)
        .map_err(|_| AppError::validation("months", "Months must be one of 1, 3 or 6."))?;

    if req.start_date < today {
        return Err(AppError::validation("start_date", "Start date cannot be in the past."));
    }
    if add_months(req.start_date, months.months()).is_none() {
        return Err(start_date_out_of_range());
    }

    let actual = weekday_index(req.start_date);
    let weekday = match req.weekday {
        Some(w) if w > 6 => {
            return Err(AppError::validation("weekday", "Weekday must be between 0 (Monday) and 6 (Sunday)."))
        }
        Some(w) if w != actual => {
            return Err(AppError::validation("start_date", "Start date must fall on the selected weekday."))
        }
        _ => actual,
    };

    Ok((months, weekday))
}

/// Holds every free weekly occurrence of a package and opens its payment, all
/// in one write transaction. Nothing is committed when no occurrence is free
/// or the total is not positive.
pub fn reserve_series(
    conn: &mut Connection,
    config: &AppConfig,
    req: &SeriesRequest,
    now: NaiveDateTime,
) -> Result<ReservedSeries, AppError> {
    let today = now.date();
    let (months, weekday) = validate_series_request(req, today)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let (field, timeslot) = load_field_and_slot(&tx, req.field_id, req.timeslot_id)?;
    check_party(&tx, &req.party)?;

    let group_key = uuid::Uuid::new_v4().to_string();
    let tx_ref = tx_ref_for(&group_key);

    let series_id = queries::insert_series(
        &tx,
        &NewSeries {
            group_key: &group_key,
            party: &req.party,
            field_id: field.id,
            timeslot_id: timeslot.id,
            weekday,
            months,
            start_date: req.start_date,
            currency: &config.currency,
        },
        now,
    )?;

    let dates = weekly_dates(req.start_date, months.months()).ok_or_else(start_date_out_of_range)?;
    let resolver = Resolver::new(&tx, config.always_open_slots, config.hold_ttl(), now);
    let mut occurrences = vec![];

    for date in dates {
        if date < today {
            continue;
        }
        if !resolver.is_open(field.id, date, timeslot.id)? {
            tracing::debug!(%date, field_id = field.id, "skipping closed occurrence");
            continue;
        }
        if resolver.has_conflict(field.id, date, timeslot.id)? {
            tracing::debug!(%date, field_id = field.id, "skipping taken occurrence");
            continue;
        }

        queries::supersede_stale_holds(&tx, field.id, date, timeslot.id, resolver.hold_cutoff(), now)?;

        let inserted = queries::insert_booking(
            &tx,
            &NewBooking {
                series_id: Some(series_id),
                party: &req.party,
                field_id: field.id,
                timeslot_id: timeslot.id,
                date,
                status: BookingStatus::Pending,
                tx_ref: &tx_ref,
            },
            now,
        )?;

        match inserted {
            Some(_) => occurrences.push(date),
            None => tracing::debug!(%date, field_id = field.id, "occurrence lost to a concurrent hold"),
        }
    }

    if occurrences.is_empty() {
        return Err(AppError::NoAvailability);
    }

    let amount = i64::try_from(occurrences.len())
        .ok()
        .and_then(|n| field.price_per_session.checked_mul(n))
        .filter(|total| *total > 0)
        .ok_or(AppError::InvalidAmount)?;

    queries::mark_series_pending(&tx, series_id, amount, &config.currency, &tx_ref, now)?;
    let payment_id = queries::insert_payment(&tx, series_id, &tx_ref, amount, &config.currency, now)?;

    let series = queries::get_series(&tx, series_id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("series {series_id} vanished inside its transaction")))?;
    tx.commit()?;

    tracing::info!(
        series_id,
        tx_ref = %tx_ref,
        weekday = weekday_name(weekday).unwrap_or("?"),
        reserved = occurrences.len(),
        amount,
        "series held pending payment"
    );

    Ok(ReservedSeries {
        series,
        field,
        timeslot,
        payment_id,
        occurrences,
    })
}

/// Staff shortcut: a single booking created approved, without payment.
pub fn create_direct_booking(
    conn: &mut Connection,
    config: &AppConfig,
    req: &DirectBookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if req.date < now.date() {
        return Err(AppError::validation("date", "Date cannot be in the past."));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let (field, timeslot) = load_field_and_slot(&tx, req.field_id, req.timeslot_id)?;
    check_party(&tx, &req.party)?;

    let resolver = Resolver::new(&tx, config.always_open_slots, config.hold_ttl(), now);
    if !resolver.is_open(field.id, req.date, timeslot.id)? {
        return Err(AppError::Unavailable("Slot closed or blacked out.".into()));
    }
    if resolver.has_conflict(field.id, req.date, timeslot.id)? {
        return Err(AppError::Conflict("Slot already taken.".into()));
    }

    queries::supersede_stale_holds(&tx, field.id, req.date, timeslot.id, resolver.hold_cutoff(), now)?;

    let id = queries::insert_booking(
        &tx,
        &NewBooking {
            series_id: None,
            party: &req.party,
            field_id: field.id,
            timeslot_id: timeslot.id,
            date: req.date,
            status: BookingStatus::Approved,
            tx_ref: "",
        },
        now,
    )?
    .ok_or_else(|| AppError::Conflict("Slot already taken.".into()))?;

    let booking = queries::get_booking(&tx, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking {id} vanished inside its transaction")))?;
    tx.commit()?;

    tracing::info!(booking_id = id, field_id = field.id, date = %req.date, "direct booking created");
    Ok(booking)
}

pub fn cancel_booking(conn: &mut Connection, id: i64, now: NaiveDateTime) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let booking = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::NotFound("booking".into()))?;

    if booking.status != BookingStatus::Cancelled {
        queries::set_booking_status(&tx, id, BookingStatus::Cancelled, now)?;
        tracing::info!(booking_id = id, "booking cancelled");
    }

    let booking = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::NotFound("booking".into()))?;
    tx.commit()?;
    Ok(booking)
}

/// Staff status edit. Moving a cancelled booking back to a live status needs
/// its slot to be free. Flags are resynchronised even when the status is
/// unchanged.
pub fn update_booking_status(
    conn: &mut Connection,
    config: &AppConfig,
    id: i64,
    status: BookingStatus,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let booking = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::NotFound("booking".into()))?;

    if booking.status == BookingStatus::Cancelled && status != BookingStatus::Cancelled {
        let resolver = Resolver::new(&tx, config.always_open_slots, config.hold_ttl(), now);
        if resolver.has_conflict(booking.field_id, booking.date, booking.timeslot_id)? {
            return Err(AppError::Conflict("Slot already taken.".into()));
        }
        queries::supersede_stale_holds(
            &tx,
            booking.field_id,
            booking.date,
            booking.timeslot_id,
            resolver.hold_cutoff(),
            now,
        )?;
    }

    queries::set_booking_status(&tx, id, status, now)?;
    let updated = queries::get_booking(&tx, id)?.ok_or_else(|| AppError::NotFound("booking".into()))?;
    tx.commit()?;

    tracing::info!(
        booking_id = id,
        from = booking.status.as_str(),
        to = status.as_str(),
        "booking status updated"
    );
    Ok(updated)
}

/// Cancels a series with every live booking in it. The payment is cancelled
/// too unless it was already paid.
pub fn cancel_series(conn: &mut Connection, id: i64, now: NaiveDateTime) -> Result<Series, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let series = queries::get_series(&tx, id)?.ok_or_else(|| AppError::NotFound("series".into()))?;

    if series.status != SeriesStatus::Cancelled {
        queries::set_series_status(&tx, id, SeriesStatus::Cancelled, now)?;

        let mut released = 0;
        for booking in queries::bookings_for_series(&tx, id)? {
            if booking.status != BookingStatus::Cancelled {
                queries::set_booking_status(&tx, booking.id, BookingStatus::Cancelled, now)?;
                released += 1;
            }
        }

        if let Some(payment) = queries::get_payment_for_series(&tx, id)? {
            if payment.status != PaymentStatus::Paid {
                queries::set_payment_status(&tx, payment.id, PaymentStatus::Cancelled, now)?;
            }
        }

        tracing::info!(series_id = id, released, "series cancelled");
    }

    let series = queries::get_series(&tx, id)?.ok_or_else(|| AppError::NotFound("series".into()))?;
    tx.commit()?;
    Ok(series)
}
