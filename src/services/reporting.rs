use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{fmt_date, queries};
use crate::errors::AppError;
use crate::services::calendar::{month_bounds, slot_label};

#[derive(Debug, Serialize)]
pub struct BookingStats {
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct Revenue {
    pub month: String,
    pub total: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct Activity {
    pub id: i64,
    pub text: String,
    pub time: String,
    pub status: crate::models::BookingStatus,
}

/// Booking counts for the seven days ending on `today`, oldest first.
pub fn booking_stats(conn: &Connection, today: NaiveDate) -> anyhow::Result<BookingStats> {
    let mut labels = Vec::with_capacity(7);
    let mut values = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let day = today - Duration::days(offset);
        labels.push(day.format("%a").to_string());
        values.push(queries::count_bookings_on(conn, day)?);
    }
    Ok(BookingStats { labels, values })
}

/// Parses `YYYY-MM`.
pub fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    month_bounds(year, month).map(|_| (year, month))
}

pub fn revenue(conn: &Connection, month: &str, currency: &str) -> Result<Revenue, AppError> {
    let (year, m) = parse_month(month).ok_or_else(|| AppError::validation("month", "Invalid month format, expected YYYY-MM."))?;
    let (start, next) =
        month_bounds(year, m).ok_or_else(|| AppError::validation("month", "Invalid month format, expected YYYY-MM."))?;

    Ok(Revenue {
        month: format!("{year:04}-{m:02}"),
        total: queries::approved_revenue_between(conn, start, next)?,
        currency: currency.to_string(),
    })
}

pub fn recent_activity(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Activity>> {
    let rows = queries::recent_bookings(conn, limit)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let who = row.who.filter(|w| !w.trim().is_empty()).unwrap_or_else(|| "User".to_string());
            Activity {
                id: row.id,
                text: format!("{who} booked {} ({})", row.field_name, slot_label(row.start_time, row.end_time)),
                time: fmt_date(row.date),
                status: row.status,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, NewBooking, Party};
    use crate::services::reservations::tests::{d, seeded, ts};

    fn book(conn: &Connection, field: i64, slot: i64, date: &str, status: BookingStatus, party: &Party) {
        queries::insert_booking(
            conn,
            &NewBooking {
                series_id: None,
                party,
                field_id: field,
                timeslot_id: slot,
                date: d(date),
                status,
                tx_ref: "",
            },
            ts("2025-06-01 08:00:00"),
        )
        .unwrap()
        .unwrap();
    }

    #[test]
    fn test_stats_cover_last_week_oldest_first() {
        let (conn, field, slot) = seeded();
        let guest = Party::Guest {
            name: "Abebe".to_string(),
            email: None,
            phone: None,
        };
        book(&conn, field, slot, "2025-06-16", BookingStatus::Approved, &guest);
        book(&conn, field, slot, "2025-06-10", BookingStatus::Pending, &guest);

        // 2025-06-16 is a Monday
        let stats = booking_stats(&conn, d("2025-06-16")).unwrap();
        assert_eq!(stats.labels, vec!["Tue", "Wed", "Thu", "Fri", "Sat", "Sun", "Mon"]);
        assert_eq!(stats.values, vec![1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_revenue_for_month() {
        let (conn, field, slot) = seeded();
        let guest = Party::Guest {
            name: "Abebe".to_string(),
            email: None,
            phone: None,
        };
        book(&conn, field, slot, "2025-06-02", BookingStatus::Approved, &guest);
        book(&conn, field, slot, "2025-06-09", BookingStatus::Approved, &guest);
        book(&conn, field, slot, "2025-06-16", BookingStatus::Cancelled, &guest);

        let june = revenue(&conn, "2025-06", "ETB").unwrap();
        assert_eq!(june.total, 1000);
        assert_eq!(revenue(&conn, "2025-07", "ETB").unwrap().total, 0);
        assert!(matches!(revenue(&conn, "June", "ETB"), Err(AppError::Validation { .. })));
        assert!(matches!(revenue(&conn, "2025-13", "ETB"), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_recent_activity_text() {
        let (conn, field, slot) = seeded();
        let user_id = queries::create_user(&conn, "Sara Tesfaye", "sara@example.com", false).unwrap();
        book(&conn, field, slot, "2025-06-02", BookingStatus::Approved, &Party::Registered { user_id });

        let items = recent_activity(&conn, 5).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Sara Tesfaye booked Pitch A (08:00–10:00)");
        assert_eq!(items[0].time, "2025-06-02");
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-06"), Some((2025, 6)));
        assert_eq!(parse_month("2025-00"), None);
        assert_eq!(parse_month("2025"), None);
    }
}
