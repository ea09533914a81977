use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Party;

/// One dated occurrence of a field/timeslot reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub series_id: Option<i64>,
    pub party: Party,
    pub field_id: i64,
    pub timeslot_id: i64,
    pub date: NaiveDate,
    pub status: BookingStatus,
    pub is_booked: bool,
    pub is_paid: bool,
    pub tx_ref: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => BookingStatus::Approved,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

/// The derived `is_booked` / `is_paid` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookingFlags {
    pub is_booked: bool,
    pub is_paid: bool,
}

impl BookingFlags {
    /// Flags a booking must carry once it is in `status`. An approved booking is
    /// always booked and paid; other statuses keep whatever was recorded.
    pub fn for_status(status: BookingStatus, current: BookingFlags) -> BookingFlags {
        match status {
            BookingStatus::Approved => BookingFlags {
                is_booked: true,
                is_paid: true,
            },
            BookingStatus::Pending | BookingStatus::Cancelled => current,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub series_id: Option<i64>,
    pub party: &'a Party,
    pub field_id: i64,
    pub timeslot_id: i64,
    pub date: NaiveDate,
    pub status: BookingStatus,
    pub tx_ref: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [BookingStatus::Pending, BookingStatus::Approved, BookingStatus::Cancelled] {
            assert_eq!(BookingStatus::parse(s.as_str()), s);
        }
        assert_eq!(BookingStatus::parse("garbage"), BookingStatus::Pending);
    }

    #[test]
    fn test_approved_forces_flags() {
        let flags = BookingFlags::for_status(BookingStatus::Approved, BookingFlags::default());
        assert!(flags.is_booked && flags.is_paid);
    }

    #[test]
    fn test_other_statuses_keep_flags() {
        let paid = BookingFlags {
            is_booked: true,
            is_paid: true,
        };
        assert_eq!(BookingFlags::for_status(BookingStatus::Cancelled, paid), paid);
        assert_eq!(
            BookingFlags::for_status(BookingStatus::Pending, BookingFlags::default()),
            BookingFlags::default()
        );
    }
}
