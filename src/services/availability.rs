use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{fmt_date, queries};
use crate::models::availability::weekday_index;
use crate::models::{hhmm, SportType, Timeslot};
use crate::services::calendar::{month_bounds, slot_label};

/// How the weekly rules for one (field, weekday, timeslot) read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeeklyPolicy {
    /// No rule rows: open by default.
    Unconfigured,
    /// At least one row is open.
    Open,
    /// Rows exist and every one is closed.
    ClosedOnly,
}

impl WeeklyPolicy {
    pub fn from_rules(flags: &[bool]) -> Self {
        if flags.is_empty() {
            WeeklyPolicy::Unconfigured
        } else if flags.iter().any(|open| *open) {
            WeeklyPolicy::Open
        } else {
            WeeklyPolicy::ClosedOnly
        }
    }

    pub fn allows(&self) -> bool {
        !matches!(self, WeeklyPolicy::ClosedOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Closed,
}

/// Answers open/conflict questions for one point in time.
pub struct Resolver<'a> {
    conn: &'a Connection,
    always_open: bool,
    fresh_cutoff: NaiveDateTime,
}

impl<'a> Resolver<'a> {
    pub fn new(conn: &'a Connection, always_open: bool, hold_ttl: Duration, now: NaiveDateTime) -> Self {
        Self {
            conn,
            always_open,
            fresh_cutoff: now - hold_ttl,
        }
    }

    /// Pending holds created before this instant no longer block.
    pub fn hold_cutoff(&self) -> NaiveDateTime {
        self.fresh_cutoff
    }

    pub fn weekly_policy(&self, field_id: i64, date: NaiveDate, timeslot_id: i64) -> anyhow::Result<WeeklyPolicy> {
        let flags = queries::weekly_rule_flags(self.conn, field_id, weekday_index(date), timeslot_id)?;
        Ok(WeeklyPolicy::from_rules(&flags))
    }

    /// Blackouts always close a slot. Weekly rules apply unless the global
    /// override is on.
    pub fn is_open(&self, field_id: i64, date: NaiveDate, timeslot_id: i64) -> anyhow::Result<bool> {
        if queries::blackout_exists(self.conn, field_id, date, timeslot_id)? {
            return Ok(false);
        }
        if self.always_open {
            return Ok(true);
        }
        Ok(self.weekly_policy(field_id, date, timeslot_id)?.allows())
    }

    pub fn has_conflict(&self, field_id: i64, date: NaiveDate, timeslot_id: i64) -> anyhow::Result<bool> {
        queries::has_blocking_booking(self.conn, field_id, date, timeslot_id, self.fresh_cutoff)
    }

    pub fn is_bookable(&self, field_id: i64, date: NaiveDate, timeslot_id: i64) -> anyhow::Result<bool> {
        Ok(self.slot_status(field_id, date, timeslot_id)? == SlotStatus::Available)
    }

    pub fn slot_status(&self, field_id: i64, date: NaiveDate, timeslot_id: i64) -> anyhow::Result<SlotStatus> {
        if !self.is_open(field_id, date, timeslot_id)? {
            return Ok(SlotStatus::Closed);
        }
        if self.has_conflict(field_id, date, timeslot_id)? {
            return Ok(SlotStatus::Booked);
        }
        Ok(SlotStatus::Available)
    }
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub timeslot_id: i64,
    pub label: String,
    pub status: SlotStatus,
    #[serde(with = "hhmm")]
    pub start_time: chrono::NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: chrono::NaiveTime,
}

/// Status of every active timeslot on `date`, ordered by start time.
pub fn day_slots(resolver: &Resolver<'_>, field_id: i64, date: NaiveDate) -> anyhow::Result<Vec<SlotView>> {
    let slots = queries::list_timeslots(resolver.conn, true)?;
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        out.push(SlotView {
            timeslot_id: slot.id,
            label: slot.label(),
            status: resolver.slot_status(field_id, date, slot.id)?,
            start_time: slot.start_time,
            end_time: slot.end_time,
        });
    }
    Ok(out)
}

/// `YYYY-MM-DD` to slot labels.
pub type DayMap = BTreeMap<String, Vec<String>>;

/// Bookable slot labels per day of the month. Days with nothing free are left out.
pub fn available_map(
    resolver: &Resolver<'_>,
    field_id: i64,
    year: i32,
    month: u32,
    only_future_from: Option<NaiveDate>,
) -> anyhow::Result<DayMap> {
    let Some((start, next)) = month_bounds(year, month) else {
        anyhow::bail!("invalid month {year}-{month}");
    };
    let slots: Vec<Timeslot> = queries::list_timeslots(resolver.conn, true)?;

    let mut out = DayMap::new();
    let mut day = start;
    while day < next {
        if only_future_from.map_or(true, |today| day >= today) {
            let mut labels = vec![];
            for slot in &slots {
                if resolver.is_bookable(field_id, day, slot.id)? {
                    labels.push(slot.label());
                }
            }
            if !labels.is_empty() {
                out.insert(fmt_date(day), labels);
            }
        }
        day += Duration::days(1);
    }
    Ok(out)
}

/// Approved slot labels per day of the month.
pub fn booked_map(
    conn: &Connection,
    field_id: i64,
    year: i32,
    month: u32,
    only_future_from: Option<NaiveDate>,
) -> anyhow::Result<DayMap> {
    let Some((start, next)) = month_bounds(year, month) else {
        anyhow::bail!("invalid month {year}-{month}");
    };

    let mut out = DayMap::new();
    for (date, start_time, end_time) in queries::approved_slots_between(conn, field_id, start, next)? {
        if only_future_from.is_some_and(|today| date < today) {
            continue;
        }
        out.entry(fmt_date(date))
            .or_default()
            .push(slot_label(start_time, end_time));
    }
    Ok(out)
}

/// Available map of the first active field of `sport`. Empty when there is none.
pub fn available_by_type(
    resolver: &Resolver<'_>,
    sport: SportType,
    year: i32,
    month: u32,
    only_future_from: Option<NaiveDate>,
) -> anyhow::Result<DayMap> {
    match queries::first_active_field_by_type(resolver.conn, sport)? {
        Some(field) => available_map(resolver, field.id, year, month, only_future_from),
        None => Ok(DayMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, TIMESTAMP_FORMAT};
    use crate::models::{BookingStatus, FieldInput, NewBooking, Party};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        conn: Connection,
        field: i64,
        morning: i64,
        evening: i64,
    }

    fn fixture() -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        let field = queries::create_field(
            &conn,
            &FieldInput {
                name: "Court 1".to_string(),
                sport_type: SportType::Tennis,
                price_per_session: 300,
                location: String::new(),
                is_active: true,
                capacity: 1,
            },
        )
        .unwrap()
        .unwrap();
        let morning = queries::create_timeslot(&conn, hhmm::parse("08:00").unwrap(), hhmm::parse("09:00").unwrap(), true)
            .unwrap()
            .unwrap();
        let evening = queries::create_timeslot(&conn, hhmm::parse("18:00").unwrap(), hhmm::parse("19:00").unwrap(), true)
            .unwrap()
            .unwrap();
        Fixture {
            conn,
            field,
            morning,
            evening,
        }
    }

    fn hold(f: &Fixture, date: NaiveDate, slot: i64, status: BookingStatus, at: NaiveDateTime) -> i64 {
        let party = Party::Guest {
            name: "Hana".to_string(),
            email: None,
            phone: None,
        };
        queries::insert_booking(
            &f.conn,
            &NewBooking {
                series_id: None,
                party: &party,
                field_id: f.field,
                timeslot_id: slot,
                date,
                status,
                tx_ref: "FIELDBOOK-t",
            },
            at,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_weekly_policy() {
        assert_eq!(WeeklyPolicy::from_rules(&[]), WeeklyPolicy::Unconfigured);
        assert_eq!(WeeklyPolicy::from_rules(&[false, true]), WeeklyPolicy::Open);
        assert_eq!(WeeklyPolicy::from_rules(&[false]), WeeklyPolicy::ClosedOnly);
        assert!(WeeklyPolicy::Unconfigured.allows());
        assert!(!WeeklyPolicy::ClosedOnly.allows());
    }

    #[test]
    fn test_unconfigured_slot_is_open() {
        let f = fixture();
        let r = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:00:00"));
        assert!(r.is_open(f.field, d("2025-06-16"), f.morning).unwrap());
    }

    #[test]
    fn test_closed_rule_respects_override() {
        let f = fixture();
        // 2025-06-16 is a Monday
        queries::upsert_weekly_rule(&f.conn, f.field, 0, f.morning, false).unwrap();
        let now = ts("2025-06-01 12:00:00");

        let strict = Resolver::new(&f.conn, false, Duration::minutes(10), now);
        assert!(!strict.is_open(f.field, d("2025-06-16"), f.morning).unwrap());
        assert!(strict.is_open(f.field, d("2025-06-17"), f.morning).unwrap());

        let open = Resolver::new(&f.conn, true, Duration::minutes(10), now);
        assert!(open.is_open(f.field, d("2025-06-16"), f.morning).unwrap());
    }

    #[test]
    fn test_blackout_wins_over_override() {
        let f = fixture();
        queries::create_blackout(&f.conn, f.field, d("2025-06-16"), None, "tournament").unwrap();
        let r = Resolver::new(&f.conn, true, Duration::minutes(10), ts("2025-06-01 12:00:00"));
        assert!(!r.is_open(f.field, d("2025-06-16"), f.morning).unwrap());
        assert!(!r.is_open(f.field, d("2025-06-16"), f.evening).unwrap());
        assert_eq!(r.slot_status(f.field, d("2025-06-16"), f.evening).unwrap(), SlotStatus::Closed);
    }

    #[test]
    fn test_pending_hold_expires() {
        let f = fixture();
        let date = d("2025-06-16");
        hold(&f, date, f.morning, BookingStatus::Pending, ts("2025-06-01 12:00:00"));

        let fresh = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:09:00"));
        assert!(fresh.has_conflict(f.field, date, f.morning).unwrap());
        assert!(!fresh.is_bookable(f.field, date, f.morning).unwrap());

        let later = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:11:00"));
        assert!(!later.has_conflict(f.field, date, f.morning).unwrap());
        assert!(later.is_bookable(f.field, date, f.morning).unwrap());
    }

    #[test]
    fn test_approved_booking_always_conflicts() {
        let f = fixture();
        let date = d("2025-06-16");
        hold(&f, date, f.evening, BookingStatus::Approved, ts("2025-01-01 00:00:00"));
        let r = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:00:00"));
        assert!(r.has_conflict(f.field, date, f.evening).unwrap());
        assert_eq!(r.slot_status(f.field, date, f.evening).unwrap(), SlotStatus::Booked);
    }

    #[test]
    fn test_day_slots_ordered_with_statuses() {
        let f = fixture();
        let date = d("2025-06-16");
        hold(&f, date, f.evening, BookingStatus::Approved, ts("2025-06-01 00:00:00"));
        queries::create_blackout(&f.conn, f.field, date, Some(f.morning), "lights").unwrap();

        let r = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:00:00"));
        let slots = day_slots(&r, f.field, date).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].label, "08:00–09:00");
        assert_eq!(slots[0].status, SlotStatus::Closed);
        assert_eq!(slots[1].status, SlotStatus::Booked);
    }

    #[test]
    fn test_month_maps() {
        let f = fixture();
        hold(&f, d("2025-06-16"), f.morning, BookingStatus::Approved, ts("2025-06-01 00:00:00"));
        hold(&f, d("2025-06-02"), f.morning, BookingStatus::Approved, ts("2025-06-01 00:00:00"));
        let r = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-10 12:00:00"));

        let available = available_map(&r, f.field, 2025, 6, Some(d("2025-06-10"))).unwrap();
        assert!(!available.contains_key("2025-06-09"));
        assert_eq!(available["2025-06-16"], vec!["18:00–19:00".to_string()]);
        assert_eq!(available["2025-06-17"].len(), 2);
        assert_eq!(available.len(), 21);

        let booked = booked_map(&f.conn, f.field, 2025, 6, Some(d("2025-06-10"))).unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked["2025-06-16"], vec!["08:00–09:00".to_string()]);

        let all_booked = booked_map(&f.conn, f.field, 2025, 6, None).unwrap();
        assert_eq!(all_booked.len(), 2);

        assert!(available_map(&r, f.field, 2025, 13, None).is_err());
    }

    #[test]
    fn test_available_by_type_without_field_is_empty() {
        let f = fixture();
        let r = Resolver::new(&f.conn, false, Duration::minutes(10), ts("2025-06-01 12:00:00"));
        assert!(available_by_type(&r, SportType::Basketball, 2025, 6, None).unwrap().is_empty());
        assert_eq!(available_by_type(&r, SportType::Tennis, 2025, 6, None).unwrap().len(), 30);
    }
}
