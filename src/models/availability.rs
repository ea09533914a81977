use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Recurring open/closed toggle for one field, weekday and timeslot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyRule {
    pub id: i64,
    pub field_id: i64,
    /// Monday = 0 ... Sunday = 6.
    pub weekday: u8,
    pub timeslot_id: i64,
    pub is_open: bool,
}

/// Manual closure of a field. `timeslot_id == None` closes the whole day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackout {
    pub id: i64,
    pub field_id: i64,
    pub date: NaiveDate,
    pub timeslot_id: Option<i64>,
    pub reason: String,
}

impl Blackout {
    pub fn is_whole_day(&self) -> bool {
        self.timeslot_id.is_none()
    }
}

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

pub fn weekday_name(index: u8) -> Option<&'static str> {
    const NAMES: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    NAMES.get(index as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_weekday_index() {
        // 2025-06-16 is a Monday
        assert_eq!(weekday_index(d("2025-06-16")), 0);
        assert_eq!(weekday_index(d("2025-06-22")), 6);
    }

    #[test]
    fn test_weekday_name() {
        assert_eq!(weekday_name(0), Some("Monday"));
        assert_eq!(weekday_name(6), Some("Sunday"));
        assert_eq!(weekday_name(7), None);
    }

    #[test]
    fn test_blackout_scope() {
        let b = Blackout {
            id: 1,
            field_id: 1,
            date: d("2025-06-16"),
            timeslot_id: None,
            reason: "maintenance".to_string(),
        };
        assert!(b.is_whole_day());
    }
}
