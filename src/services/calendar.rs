use chrono::{Duration, Months, NaiveDate, NaiveTime};

/// Advances `date` by `months` calendar months. The day of month is clamped to
/// the last valid day of the target month, so Jan 31 + 1 month is Feb 28/29.
/// `None` past the last representable date.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Every date from `start`, stepping by a week, strictly before
/// `add_months(start, months)`. `None` when that end date is out of range.
pub fn weekly_dates(start: NaiveDate, months: u32) -> Option<Vec<NaiveDate>> {
    let end = add_months(start, months)?;
    let mut out = Vec::new();
    let mut cur = start;
    while cur < end {
        out.push(cur);
        // a step past the last representable date is also past `end`
        let Some(next) = cur.checked_add_signed(Duration::days(7)) else {
            break;
        };
        cur = next;
    }
    Some(out)
}

/// First day of `year`-`month` and the first day of the following month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((start, add_months(start, 1)?))
}

/// `HH:MM–HH:MM` with an en dash.
pub fn slot_label(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}–{}", start.format("%H:%M"), end.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(d("2025-01-31"), 1), Some(d("2025-02-28")));
        assert_eq!(add_months(d("2024-01-31"), 1), Some(d("2024-02-29")));
        assert_eq!(add_months(d("2025-08-31"), 1), Some(d("2025-09-30")));
    }

    #[test]
    fn test_add_months_crosses_year() {
        assert_eq!(add_months(d("2025-11-15"), 3), Some(d("2026-02-15")));
        assert_eq!(add_months(d("2025-07-10"), 6), Some(d("2026-01-10")));
        assert_eq!(add_months(d("2025-07-10"), 0), Some(d("2025-07-10")));
    }

    #[test]
    fn test_weekly_dates_one_month_of_mondays() {
        // 2025-06-02 is a Monday; the window ends on 2025-07-02
        let dates = weekly_dates(d("2025-06-02"), 1).unwrap();
        assert_eq!(
            dates,
            vec![d("2025-06-02"), d("2025-06-09"), d("2025-06-16"), d("2025-06-23"), d("2025-06-30")]
        );
    }

    #[test]
    fn test_weekly_dates_count_matches_window() {
        for (start, months) in [("2025-02-03", 1), ("2025-01-31", 1), ("2025-03-10", 3), ("2024-12-30", 6)] {
            let start = d(start);
            let end = add_months(start, months).unwrap();
            let dates = weekly_dates(start, months).unwrap();
            let days = (end - start).num_days();
            assert_eq!(dates.len() as i64, (days + 6) / 7, "start {start} months {months}");
            assert!(dates.iter().all(|x| *x >= start && *x < end));
            assert!(dates.windows(2).all(|w| (w[1] - w[0]).num_days() == 7));
            assert!(dates.iter().all(|x| x.weekday() == start.weekday()));
        }
    }

    #[test]
    fn test_weekly_dates_is_replayable() {
        assert_eq!(weekly_dates(d("2025-05-05"), 3), weekly_dates(d("2025-05-05"), 3));
    }

    #[test]
    fn test_window_past_max_date_is_none() {
        assert_eq!(add_months(NaiveDate::MAX, 1), None);
        assert_eq!(weekly_dates(NaiveDate::MAX, 1), None);
        assert_eq!(weekly_dates(d("2025-05-05"), 0), Some(vec![]));

        // the window fits but the step after the last date does not
        let late = NaiveDate::MAX.checked_sub_months(Months::new(1)).unwrap();
        let dates = weekly_dates(late, 1).unwrap();
        assert!(!dates.is_empty());
        assert!(dates.iter().all(|x| *x >= late && *x <= NaiveDate::MAX));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(2025, 12), Some((d("2025-12-01"), d("2026-01-01"))));
        assert_eq!(month_bounds(2025, 13), None);
        assert_eq!(month_bounds(2025, 0), None);
        assert_eq!(month_bounds(300_000, 1), None);
        assert_eq!(month_bounds(NaiveDate::MAX.year(), 12), None);
    }

    #[test]
    fn test_slot_label() {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(slot_label(start, end), "08:00–10:00");
    }
}
