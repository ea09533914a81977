use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use super::{fmt_date, fmt_ts, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::models::{
    hhmm, Blackout, Booking, BookingFlags, BookingStatus, Field, FieldInput, NewBooking, NewSeries,
    Party, Payment, PaymentStatus, Series, SeriesStatus, SportType, Timeslot, User, WeeklyRule,
};

/// True when `e` is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid stored date: {s}"))
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    hhmm::parse(s).with_context(|| format!("invalid stored time: {s}"))
}

fn fmt_time(t: NaiveTime) -> String {
    t.format(hhmm::FORMAT).to_string()
}

// ── Users ──

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, full_name, email, is_staff FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    email: row.get(2)?,
                    is_staff: row.get::<_, i32>(3)? != 0,
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn create_user(conn: &Connection, full_name: &str, email: &str, is_staff: bool) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (full_name, email, is_staff) VALUES (?1, ?2, ?3)",
        params![full_name, email, is_staff as i32],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Fields ──

const FIELD_COLUMNS: &str =
    "id, name, sport_type, price_per_session, location, is_active, capacity, created_at";

fn parse_field_row(row: &rusqlite::Row) -> anyhow::Result<Field> {
    let sport: String = row.get(2)?;
    Ok(Field {
        id: row.get(0)?,
        name: row.get(1)?,
        sport_type: SportType::parse(&sport)
            .with_context(|| format!("invalid stored sport type: {sport}"))?,
        price_per_session: row.get(3)?,
        location: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        capacity: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn list_fields(conn: &Connection, active: Option<bool>) -> anyhow::Result<Vec<Field>> {
    let (sql, params_vec): (String, Vec<Box<dyn ToSql>>) = match active {
        Some(flag) => (
            format!("SELECT {FIELD_COLUMNS} FROM fields WHERE is_active = ?1 ORDER BY name"),
            vec![Box::new(flag as i32) as Box<dyn ToSql>],
        ),
        None => (format!("SELECT {FIELD_COLUMNS} FROM fields ORDER BY name"), vec![]),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_field_row(row)))?;

    let mut fields = vec![];
    for row in rows {
        fields.push(row??);
    }
    Ok(fields)
}

pub fn get_field(conn: &Connection, id: i64) -> anyhow::Result<Option<Field>> {
    let result = conn.query_row(
        &format!("SELECT {FIELD_COLUMNS} FROM fields WHERE id = ?1"),
        params![id],
        |row| Ok(parse_field_row(row)),
    );

    match result {
        Ok(field) => Ok(Some(field?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn first_active_field_by_type(conn: &Connection, sport: SportType) -> anyhow::Result<Option<Field>> {
    let result = conn.query_row(
        &format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE sport_type = ?1 AND is_active = 1 ORDER BY name LIMIT 1"
        ),
        params![sport.as_str()],
        |row| Ok(parse_field_row(row)),
    );

    match result {
        Ok(field) => Ok(Some(field?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns `None` when the name is already taken.
pub fn create_field(conn: &Connection, input: &FieldInput) -> anyhow::Result<Option<i64>> {
    let result = conn.execute(
        "INSERT INTO fields (name, sport_type, price_per_session, location, is_active, capacity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.name.trim(),
            input.sport_type.as_str(),
            input.price_per_session,
            input.location,
            input.is_active as i32,
            input.capacity,
        ],
    );

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `None` when the new name belongs to another field, otherwise whether a row changed.
pub fn update_field(conn: &Connection, id: i64, input: &FieldInput) -> anyhow::Result<Option<bool>> {
    let result = conn.execute(
        "UPDATE fields SET name = ?1, sport_type = ?2, price_per_session = ?3, location = ?4,
                is_active = ?5, capacity = ?6
         WHERE id = ?7",
        params![
            input.name.trim(),
            input.sport_type.as_str(),
            input.price_per_session,
            input.location,
            input.is_active as i32,
            input.capacity,
            id,
        ],
    );

    match result {
        Ok(count) => Ok(Some(count > 0)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings and series that still point at the field.
pub fn field_reference_count(conn: &Connection, id: i64) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM bookings WHERE field_id = ?1)
              + (SELECT COUNT(*) FROM series WHERE field_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_field(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM fields WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Timeslots ──

fn parse_timeslot_row(row: &rusqlite::Row) -> anyhow::Result<Timeslot> {
    let start: String = row.get(1)?;
    let end: String = row.get(2)?;
    Ok(Timeslot {
        id: row.get(0)?,
        start_time: parse_time(&start)?,
        end_time: parse_time(&end)?,
        is_active: row.get::<_, i32>(3)? != 0,
    })
}

pub fn list_timeslots(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Timeslot>> {
    let sql = if active_only {
        "SELECT id, start_time, end_time, is_active FROM timeslots WHERE is_active = 1 ORDER BY start_time, end_time"
    } else {
        "SELECT id, start_time, end_time, is_active FROM timeslots ORDER BY start_time, end_time"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_timeslot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn get_timeslot(conn: &Connection, id: i64) -> anyhow::Result<Option<Timeslot>> {
    let result = conn.query_row(
        "SELECT id, start_time, end_time, is_active FROM timeslots WHERE id = ?1",
        params![id],
        |row| Ok(parse_timeslot_row(row)),
    );

    match result {
        Ok(slot) => Ok(Some(slot?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns `None` when a timeslot with the same start and end already exists.
pub fn create_timeslot(
    conn: &Connection,
    start: NaiveTime,
    end: NaiveTime,
    is_active: bool,
) -> anyhow::Result<Option<i64>> {
    let result = conn.execute(
        "INSERT INTO timeslots (start_time, end_time, is_active) VALUES (?1, ?2, ?3)",
        params![fmt_time(start), fmt_time(end), is_active as i32],
    );

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn timeslot_reference_count(conn: &Connection, id: i64) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM bookings WHERE timeslot_id = ?1)
              + (SELECT COUNT(*) FROM series WHERE timeslot_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_timeslot(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM timeslots WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Weekly Rules ──

/// `is_open` of every rule row for the triple. Empty when none is configured.
pub fn weekly_rule_flags(
    conn: &Connection,
    field_id: i64,
    weekday: u8,
    timeslot_id: i64,
) -> anyhow::Result<Vec<bool>> {
    let mut stmt = conn.prepare(
        "SELECT is_open FROM weekly_rules WHERE field_id = ?1 AND weekday = ?2 AND timeslot_id = ?3",
    )?;
    let rows = stmt.query_map(params![field_id, weekday, timeslot_id], |row| {
        Ok(row.get::<_, i32>(0)? != 0)
    })?;

    let mut flags = vec![];
    for row in rows {
        flags.push(row?);
    }
    Ok(flags)
}

pub fn upsert_weekly_rule(
    conn: &Connection,
    field_id: i64,
    weekday: u8,
    timeslot_id: i64,
    is_open: bool,
) -> anyhow::Result<WeeklyRule> {
    conn.execute(
        "INSERT INTO weekly_rules (field_id, weekday, timeslot_id, is_open) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(field_id, weekday, timeslot_id) DO UPDATE SET is_open = excluded.is_open",
        params![field_id, weekday, timeslot_id, is_open as i32],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM weekly_rules WHERE field_id = ?1 AND weekday = ?2 AND timeslot_id = ?3",
        params![field_id, weekday, timeslot_id],
        |row| row.get(0),
    )?;

    Ok(WeeklyRule {
        id,
        field_id,
        weekday,
        timeslot_id,
        is_open,
    })
}

pub fn list_weekly_rules(conn: &Connection, field_id: i64) -> anyhow::Result<Vec<WeeklyRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, field_id, weekday, timeslot_id, is_open FROM weekly_rules
         WHERE field_id = ?1 ORDER BY weekday, timeslot_id",
    )?;
    let rows = stmt.query_map(params![field_id], |row| {
        Ok(WeeklyRule {
            id: row.get(0)?,
            field_id: row.get(1)?,
            weekday: row.get(2)?,
            timeslot_id: row.get(3)?,
            is_open: row.get::<_, i32>(4)? != 0,
        })
    })?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row?);
    }
    Ok(rules)
}

// ── Blackouts ──

/// A whole-day blackout or one scoped to exactly this timeslot.
pub fn blackout_exists(
    conn: &Connection,
    field_id: i64,
    date: NaiveDate,
    timeslot_id: i64,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blackouts
         WHERE field_id = ?1 AND date = ?2 AND (timeslot_id IS NULL OR timeslot_id = ?3)",
        params![field_id, fmt_date(date), timeslot_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn create_blackout(
    conn: &Connection,
    field_id: i64,
    date: NaiveDate,
    timeslot_id: Option<i64>,
    reason: &str,
) -> anyhow::Result<Blackout> {
    conn.execute(
        "INSERT INTO blackouts (field_id, date, timeslot_id, reason) VALUES (?1, ?2, ?3, ?4)",
        params![field_id, fmt_date(date), timeslot_id, reason],
    )?;
    Ok(Blackout {
        id: conn.last_insert_rowid(),
        field_id,
        date,
        timeslot_id,
        reason: reason.to_string(),
    })
}

pub fn list_blackouts(conn: &Connection, field_id: i64) -> anyhow::Result<Vec<Blackout>> {
    let mut stmt = conn.prepare(
        "SELECT id, field_id, date, timeslot_id, reason FROM blackouts
         WHERE field_id = ?1 ORDER BY date, timeslot_id",
    )?;
    let rows = stmt.query_map(params![field_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut blackouts = vec![];
    for row in rows {
        let (id, field_id, date, timeslot_id, reason) = row?;
        blackouts.push(Blackout {
            id,
            field_id,
            date: parse_date(&date)?,
            timeslot_id,
            reason,
        });
    }
    Ok(blackouts)
}

pub fn delete_blackout(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM blackouts WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, series_id, user_id, guest_name, guest_email, guest_phone, field_id, \
     timeslot_id, date, status, is_booked, is_paid, tx_ref, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date: String = row.get(8)?;
    let status: String = row.get(9)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        series_id: row.get(1)?,
        party: Party::from_columns(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
        field_id: row.get(6)?,
        timeslot_id: row.get(7)?,
        date: parse_date(&date)?,
        status: BookingStatus::parse(&status),
        is_booked: row.get::<_, i32>(10)? != 0,
        is_paid: row.get::<_, i32>(11)? != 0,
        tx_ref: row.get(12)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// An approved booking, or a pending hold created at or after `fresh_cutoff`.
pub fn has_blocking_booking(
    conn: &Connection,
    field_id: i64,
    date: NaiveDate,
    timeslot_id: i64,
    fresh_cutoff: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE field_id = ?1 AND date = ?2 AND timeslot_id = ?3
           AND (status = 'approved' OR (status = 'pending' AND created_at >= ?4))",
        params![field_id, fmt_date(date), timeslot_id, fmt_ts(fresh_cutoff)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Cancels pending holds on the slot that were created before `cutoff`, so a
/// new reservation can take their place under the unique index.
pub fn supersede_stale_holds(
    conn: &Connection,
    field_id: i64,
    date: NaiveDate,
    timeslot_id: i64,
    cutoff: NaiveDateTime,
    now: NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', updated_at = ?5
         WHERE field_id = ?1 AND date = ?2 AND timeslot_id = ?3
           AND status = 'pending' AND created_at < ?4",
        params![field_id, fmt_date(date), timeslot_id, fmt_ts(cutoff), fmt_ts(now)],
    )?;
    Ok(count)
}

/// Inserts a booking. Returns `None` when another live booking already holds
/// the same field/date/timeslot.
pub fn insert_booking(
    conn: &Connection,
    booking: &NewBooking<'_>,
    now: NaiveDateTime,
) -> anyhow::Result<Option<i64>> {
    let flags = BookingFlags::for_status(booking.status, BookingFlags::default());
    let party = booking.party.columns();
    let now = fmt_ts(now);

    let result = conn.execute(
        "INSERT INTO bookings (series_id, user_id, guest_name, guest_email, guest_phone, field_id,
                               timeslot_id, date, status, is_booked, is_paid, tx_ref, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            booking.series_id,
            party.user_id,
            party.guest_name,
            party.guest_email,
            party.guest_phone,
            booking.field_id,
            booking.timeslot_id,
            fmt_date(booking.date),
            booking.status.as_str(),
            flags.is_booked as i32,
            flags.is_paid as i32,
            booking.tx_ref,
            now,
        ],
    );

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ),
            vec![Box::new(status.as_str()) as Box<dyn ToSql>, Box::new(limit)],
        ),
        None => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, id DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn bookings_for_series(conn: &Connection, series_id: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE series_id = ?1 ORDER BY date"
    ))?;
    let rows = stmt.query_map(params![series_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves a booking to `status`, rewriting the derived flags to match.
/// Every status transition goes through here.
pub fn set_booking_status(
    conn: &Connection,
    id: i64,
    status: BookingStatus,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let current = conn
        .query_row(
            "SELECT is_booked, is_paid FROM bookings WHERE id = ?1",
            params![id],
            |row| {
                Ok(BookingFlags {
                    is_booked: row.get::<_, i32>(0)? != 0,
                    is_paid: row.get::<_, i32>(1)? != 0,
                })
            },
        )
        .optional()?;

    let Some(current) = current else {
        return Ok(false);
    };

    let flags = BookingFlags::for_status(status, current);
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, is_booked = ?2, is_paid = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            status.as_str(),
            flags.is_booked as i32,
            flags.is_paid as i32,
            fmt_ts(now),
            id
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Pending bookings for a payment reference still inside the hold window.
pub fn fresh_pending_ids_for_tx_ref(
    conn: &Connection,
    tx_ref: &str,
    fresh_cutoff: NaiveDateTime,
) -> anyhow::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM bookings WHERE tx_ref = ?1 AND status = 'pending' AND created_at >= ?2 ORDER BY date",
    )?;
    let rows = stmt.query_map(params![tx_ref, fmt_ts(fresh_cutoff)], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// `(date, start, end)` of approved bookings on a field in `[start, end)`.
pub fn approved_slots_between(
    conn: &Connection,
    field_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<(NaiveDate, NaiveTime, NaiveTime)>> {
    let mut stmt = conn.prepare(
        "SELECT b.date, t.start_time, t.end_time
         FROM bookings b JOIN timeslots t ON t.id = b.timeslot_id
         WHERE b.field_id = ?1 AND b.date >= ?2 AND b.date < ?3 AND b.status = 'approved'
         ORDER BY b.date, t.start_time",
    )?;
    let rows = stmt.query_map(params![field_id, fmt_date(start), fmt_date(end)], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?;

    let mut out = vec![];
    for row in rows {
        let (date, start, end) = row?;
        out.push((parse_date(&date)?, parse_time(&start)?, parse_time(&end)?));
    }
    Ok(out)
}

// ── Series ──

const SERIES_COLUMNS: &str = "id, group_key, status, user_id, guest_name, guest_email, guest_phone, \
     field_id, timeslot_id, weekday, months, start_date, tx_ref, checkout_url, amount, currency, \
     created_at, updated_at";

fn parse_series_row(row: &rusqlite::Row) -> anyhow::Result<Series> {
    let status: String = row.get(2)?;
    let start_date: String = row.get(11)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    Ok(Series {
        id: row.get(0)?,
        group_key: row.get(1)?,
        status: SeriesStatus::parse(&status),
        party: Party::from_columns(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
        field_id: row.get(7)?,
        timeslot_id: row.get(8)?,
        weekday: row.get(9)?,
        months: row.get(10)?,
        start_date: parse_date(&start_date)?,
        tx_ref: row.get(12)?,
        checkout_url: row.get(13)?,
        amount: row.get(14)?,
        currency: row.get(15)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub fn insert_series(conn: &Connection, series: &NewSeries<'_>, now: NaiveDateTime) -> anyhow::Result<i64> {
    let party = series.party.columns();
    conn.execute(
        "INSERT INTO series (group_key, status, user_id, guest_name, guest_email, guest_phone, field_id,
                             timeslot_id, weekday, months, start_date, currency, created_at, updated_at)
         VALUES (?1, 'draft', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            series.group_key,
            party.user_id,
            party.guest_name,
            party.guest_email,
            party.guest_phone,
            series.field_id,
            series.timeslot_id,
            series.weekday,
            series.months.months(),
            fmt_date(series.start_date),
            series.currency,
            fmt_ts(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_series(conn: &Connection, id: i64) -> anyhow::Result<Option<Series>> {
    let result = conn.query_row(
        &format!("SELECT {SERIES_COLUMNS} FROM series WHERE id = ?1"),
        params![id],
        |row| Ok(parse_series_row(row)),
    );

    match result {
        Ok(series) => Ok(Some(series?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_series(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Series>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERIES_COLUMNS} FROM series ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_series_row(row)))?;

    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

/// Records the priced hold and moves the series from draft to pending.
pub fn mark_series_pending(
    conn: &Connection,
    id: i64,
    amount: i64,
    currency: &str,
    tx_ref: &str,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE series SET amount = ?1, currency = ?2, tx_ref = ?3, status = 'pending', updated_at = ?4
         WHERE id = ?5",
        params![amount, currency, tx_ref, fmt_ts(now), id],
    )?;
    Ok(())
}

pub fn set_series_checkout_url(conn: &Connection, id: i64, url: &str, now: NaiveDateTime) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE series SET checkout_url = ?1, updated_at = ?2 WHERE id = ?3",
        params![url, fmt_ts(now), id],
    )?;
    Ok(())
}

pub fn set_series_status(
    conn: &Connection,
    id: i64,
    status: SeriesStatus,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE series SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(now), id],
    )?;
    Ok(count > 0)
}

// ── Payments ──

const PAYMENT_COLUMNS: &str = "p.id, p.series_id, p.tx_ref, p.amount, p.currency, p.status, \
     p.checkout_url, p.paid_at, p.payload, p.created_at, p.updated_at";

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let status: String = row.get(5)?;
    let paid_at: Option<String> = row.get(7)?;
    let payload: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Payment {
        id: row.get(0)?,
        series_id: row.get(1)?,
        tx_ref: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        status: PaymentStatus::parse(&status)
            .with_context(|| format!("invalid stored payment status: {status}"))?,
        checkout_url: row.get(6)?,
        paid_at: paid_at.as_deref().map(parse_ts).transpose()?,
        payload: payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("invalid stored payment payload")?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub fn insert_payment(
    conn: &Connection,
    series_id: i64,
    tx_ref: &str,
    amount: i64,
    currency: &str,
    now: NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO payments (series_id, tx_ref, amount, currency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'initiated', ?5, ?5)",
        params![series_id, tx_ref, amount, currency, fmt_ts(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_payment(conn: &Connection, id: i64) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.id = ?1"),
        params![id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_payment_by_tx_ref(conn: &Connection, tx_ref: &str) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.tx_ref = ?1"),
        params![tx_ref],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_payment_for_series(conn: &Connection, series_id: i64) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.series_id = ?1"),
        params![series_id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set_payment_checkout_url(conn: &Connection, id: i64, url: &str, now: NaiveDateTime) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE payments SET checkout_url = ?1, updated_at = ?2 WHERE id = ?3",
        params![url, fmt_ts(now), id],
    )?;
    Ok(())
}

pub fn mark_payment_paid(
    conn: &Connection,
    id: i64,
    payload: &serde_json::Value,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    let now = fmt_ts(now);
    conn.execute(
        "UPDATE payments SET status = 'paid', paid_at = ?1, payload = ?2, updated_at = ?1 WHERE id = ?3",
        params![now, serde_json::to_string(payload)?, id],
    )?;
    Ok(())
}

pub fn set_payment_status(
    conn: &Connection,
    id: i64,
    status: PaymentStatus,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(now), id],
    )?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct PaymentFilter {
    /// Matched against the reference, guest contact fields and the field name.
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
    pub created_on: Option<NaiveDate>,
}

pub fn list_payments(conn: &Connection, filter: &PaymentFilter, limit: i64) -> anyhow::Result<Vec<Payment>> {
    let mut sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments p
         JOIN series s ON s.id = p.series_id
         JOIN fields f ON f.id = s.field_id
         WHERE 1 = 1"
    );
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(q) = filter.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        params_vec.push(Box::new(format!("%{q}%")));
        let n = params_vec.len();
        sql.push_str(&format!(
            " AND (p.tx_ref LIKE ?{n} OR s.guest_name LIKE ?{n} OR s.guest_email LIKE ?{n}
                   OR s.guest_phone LIKE ?{n} OR f.name LIKE ?{n})"
        ));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND p.status = ?{}", params_vec.len()));
    }
    if let Some(day) = filter.created_on {
        params_vec.push(Box::new(fmt_date(day)));
        sql.push_str(&format!(" AND substr(p.created_at, 1, 10) = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(" ORDER BY p.created_at DESC, p.id DESC LIMIT ?{}", params_vec.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

// ── Reporting ──

pub fn count_bookings_on(conn: &Connection, date: NaiveDate) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE date = ?1",
        params![fmt_date(date)],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Sum of the field price over approved bookings dated in `[start, end)`.
pub fn approved_revenue_between(conn: &Connection, start: NaiveDate, end: NaiveDate) -> anyhow::Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(f.price_per_session), 0)
         FROM bookings b JOIN fields f ON f.id = b.field_id
         WHERE b.status = 'approved' AND b.date >= ?1 AND b.date < ?2",
        params![fmt_date(start), fmt_date(end)],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub struct ActivityRow {
    pub id: i64,
    pub who: Option<String>,
    pub field_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date: NaiveDate,
    pub status: BookingStatus,
}

pub fn recent_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<ActivityRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, COALESCE(NULLIF(b.guest_name, ''), u.full_name), f.name,
                t.start_time, t.end_time, b.date, b.status
         FROM bookings b
         JOIN fields f ON f.id = b.field_id
         JOIN timeslots t ON t.id = b.timeslot_id
         LEFT JOIN users u ON u.id = b.user_id
         ORDER BY b.id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = vec![];
    for row in rows {
        let (id, who, field_name, start, end, date, status) = row?;
        out.push(ActivityRow {
            id,
            who,
            field_name,
            start_time: parse_time(&start)?,
            end_time: parse_time(&end)?,
            date: parse_date(&date)?,
            status: BookingStatus::parse(&status),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::PackageLength;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        hhmm::parse(s).unwrap()
    }

    fn seed(conn: &Connection) -> (i64, i64) {
        let field = create_field(
            conn,
            &FieldInput {
                name: "Pitch A".to_string(),
                sport_type: SportType::Football,
                price_per_session: 500,
                location: "North".to_string(),
                is_active: true,
                capacity: 1,
            },
        )
        .unwrap()
        .unwrap();
        let slot = create_timeslot(conn, t("08:00"), t("10:00"), true).unwrap().unwrap();
        (field, slot)
    }

    fn guest() -> Party {
        Party::Guest {
            name: "Abebe".to_string(),
            email: Some("abebe@example.com".to_string()),
            phone: None,
        }
    }

    #[test]
    fn test_duplicate_field_name_and_timeslot() {
        let conn = db::init_db(":memory:").unwrap();
        let (_, _) = seed(&conn);
        let again = FieldInput {
            name: "Pitch A".to_string(),
            sport_type: SportType::Tennis,
            price_per_session: 100,
            location: String::new(),
            is_active: true,
            capacity: 1,
        };
        assert_eq!(create_field(&conn, &again).unwrap(), None);
        assert_eq!(create_timeslot(&conn, t("08:00"), t("10:00"), false).unwrap(), None);
    }

    #[test]
    fn test_one_live_booking_per_slot() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let party = guest();
        let now = ts("2025-06-01 09:00:00");
        let new = NewBooking {
            series_id: None,
            party: &party,
            field_id: field,
            timeslot_id: slot,
            date: d("2025-06-16"),
            status: BookingStatus::Pending,
            tx_ref: "FIELDBOOK-a",
        };

        let first = insert_booking(&conn, &new, now).unwrap().unwrap();
        assert_eq!(insert_booking(&conn, &new, now).unwrap(), None);

        set_booking_status(&conn, first, BookingStatus::Cancelled, now).unwrap();
        assert!(insert_booking(&conn, &new, now).unwrap().is_some());
    }

    #[test]
    fn test_set_status_approved_forces_flags() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let party = guest();
        let now = ts("2025-06-01 09:00:00");
        let id = insert_booking(
            &conn,
            &NewBooking {
                series_id: None,
                party: &party,
                field_id: field,
                timeslot_id: slot,
                date: d("2025-06-16"),
                status: BookingStatus::Pending,
                tx_ref: "",
            },
            now,
        )
        .unwrap()
        .unwrap();

        let pending = get_booking(&conn, id).unwrap().unwrap();
        assert!(!pending.is_booked && !pending.is_paid);
        assert_eq!(pending.party, party);

        assert!(set_booking_status(&conn, id, BookingStatus::Approved, now).unwrap());
        let approved = get_booking(&conn, id).unwrap().unwrap();
        assert_eq!(approved.status, BookingStatus::Approved);
        assert!(approved.is_booked && approved.is_paid);

        assert!(set_booking_status(&conn, id, BookingStatus::Cancelled, now).unwrap());
        let cancelled = get_booking(&conn, id).unwrap().unwrap();
        assert!(cancelled.is_booked && cancelled.is_paid);

        assert!(!set_booking_status(&conn, 999, BookingStatus::Approved, now).unwrap());
    }

    #[test]
    fn test_blocking_booking_respects_hold_window() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let party = guest();
        let date = d("2025-06-16");
        insert_booking(
            &conn,
            &NewBooking {
                series_id: None,
                party: &party,
                field_id: field,
                timeslot_id: slot,
                date,
                status: BookingStatus::Pending,
                tx_ref: "FIELDBOOK-x",
            },
            ts("2025-06-01 09:00:00"),
        )
        .unwrap();

        assert!(has_blocking_booking(&conn, field, date, slot, ts("2025-06-01 08:55:00")).unwrap());
        assert!(!has_blocking_booking(&conn, field, date, slot, ts("2025-06-01 09:00:01")).unwrap());

        let superseded =
            supersede_stale_holds(&conn, field, date, slot, ts("2025-06-01 09:00:01"), ts("2025-06-01 09:11:00"))
                .unwrap();
        assert_eq!(superseded, 1);
        assert!(fresh_pending_ids_for_tx_ref(&conn, "FIELDBOOK-x", ts("2025-06-01 08:00:00"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_weekly_rule_upsert_and_flags() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        assert!(weekly_rule_flags(&conn, field, 0, slot).unwrap().is_empty());

        upsert_weekly_rule(&conn, field, 0, slot, false).unwrap();
        assert_eq!(weekly_rule_flags(&conn, field, 0, slot).unwrap(), vec![false]);

        let rule = upsert_weekly_rule(&conn, field, 0, slot, true).unwrap();
        assert!(rule.is_open);
        assert_eq!(list_weekly_rules(&conn, field).unwrap().len(), 1);
    }

    #[test]
    fn test_blackout_scopes() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let other = create_timeslot(&conn, t("10:00"), t("12:00"), true).unwrap().unwrap();
        let date = d("2025-06-16");

        create_blackout(&conn, field, date, Some(slot), "lights").unwrap();
        assert!(blackout_exists(&conn, field, date, slot).unwrap());
        assert!(!blackout_exists(&conn, field, date, other).unwrap());

        let whole = create_blackout(&conn, field, d("2025-06-17"), None, "holiday").unwrap();
        assert!(blackout_exists(&conn, field, d("2025-06-17"), other).unwrap());
        assert_eq!(list_blackouts(&conn, field).unwrap().len(), 2);

        assert!(delete_blackout(&conn, whole.id).unwrap());
        assert!(!blackout_exists(&conn, field, d("2025-06-17"), other).unwrap());
    }

    #[test]
    fn test_series_and_payment_lifecycle() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let party = guest();
        let now = ts("2025-06-01 09:00:00");

        let series_id = insert_series(
            &conn,
            &NewSeries {
                group_key: "abc",
                party: &party,
                field_id: field,
                timeslot_id: slot,
                weekday: 0,
                months: PackageLength::OneMonth,
                start_date: d("2025-06-02"),
                currency: "ETB",
            },
            now,
        )
        .unwrap();

        let draft = get_series(&conn, series_id).unwrap().unwrap();
        assert_eq!(draft.status, SeriesStatus::Draft);
        assert_eq!(draft.tx_ref, None);

        mark_series_pending(&conn, series_id, 2500, "ETB", "FIELDBOOK-abc", now).unwrap();
        let payment_id = insert_payment(&conn, series_id, "FIELDBOOK-abc", 2500, "ETB", now).unwrap();

        let pending = get_series(&conn, series_id).unwrap().unwrap();
        assert_eq!(pending.status, SeriesStatus::Pending);
        assert_eq!(pending.amount, 2500);

        mark_payment_paid(&conn, payment_id, &serde_json::json!({"status": "success"}), now).unwrap();
        let paid = get_payment_by_tx_ref(&conn, "FIELDBOOK-abc").unwrap().unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.paid_at, Some(now));
        assert_eq!(paid.payload.unwrap()["status"], "success");

        let filter = PaymentFilter {
            search: Some("abebe".to_string()),
            status: Some(PaymentStatus::Paid),
            created_on: Some(d("2025-06-01")),
        };
        assert_eq!(list_payments(&conn, &filter, 50).unwrap().len(), 1);

        let miss = PaymentFilter {
            status: Some(PaymentStatus::Failed),
            ..Default::default()
        };
        assert!(list_payments(&conn, &miss, 50).unwrap().is_empty());
        assert_eq!(field_reference_count(&conn, field).unwrap(), 1);
    }

    #[test]
    fn test_revenue_counts_only_approved() {
        let conn = db::init_db(":memory:").unwrap();
        let (field, slot) = seed(&conn);
        let party = guest();
        let now = ts("2025-06-01 09:00:00");

        for (date, status) in [
            ("2025-06-02", BookingStatus::Approved),
            ("2025-06-09", BookingStatus::Approved),
            ("2025-06-16", BookingStatus::Pending),
            ("2025-07-07", BookingStatus::Approved),
        ] {
            insert_booking(
                &conn,
                &NewBooking {
                    series_id: None,
                    party: &party,
                    field_id: field,
                    timeslot_id: slot,
                    date: d(date),
                    status,
                    tx_ref: "",
                },
                now,
            )
            .unwrap();
        }

        assert_eq!(approved_revenue_between(&conn, d("2025-06-01"), d("2025-07-01")).unwrap(), 1000);
        assert_eq!(approved_slots_between(&conn, field, d("2025-06-01"), d("2025-07-01")).unwrap().len(), 2);
        assert_eq!(count_bookings_on(&conn, d("2025-06-16")).unwrap(), 1);

        let recent = recent_bookings(&conn, 5).unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].date, d("2025-07-07"));
        assert_eq!(recent[0].who.as_deref(), Some("Abebe"));
    }
}
