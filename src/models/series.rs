use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Party;

/// A weekly package purchase covering 1, 3 or 6 months of one weekday/timeslot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub group_key: String,
    pub status: SeriesStatus,
    pub party: Party,
    pub field_id: i64,
    pub timeslot_id: i64,
    pub weekday: u8,
    pub months: u32,
    pub start_date: NaiveDate,
    pub tx_ref: Option<String>,
    pub checkout_url: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Draft,
    Pending,
    Approved,
    Cancelled,
}

impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesStatus::Draft => "draft",
            SeriesStatus::Pending => "pending",
            SeriesStatus::Approved => "approved",
            SeriesStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => SeriesStatus::Pending,
            "approved" => SeriesStatus::Approved,
            "cancelled" => SeriesStatus::Cancelled,
            _ => SeriesStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLength {
    OneMonth,
    ThreeMonths,
    SixMonths,
}

impl PackageLength {
    pub fn months(&self) -> u32 {
        match self {
            PackageLength::OneMonth => 1,
            PackageLength::ThreeMonths => 3,
            PackageLength::SixMonths => 6,
        }
    }
}

impl TryFrom<u32> for PackageLength {
    type Error = u32;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        match months {
            1 => Ok(PackageLength::OneMonth),
            3 => Ok(PackageLength::ThreeMonths),
            6 => Ok(PackageLength::SixMonths),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSeries<'a> {
    pub group_key: &'a str,
    pub party: &'a Party,
    pub field_id: i64,
    pub timeslot_id: i64,
    pub weekday: u8,
    pub months: PackageLength,
    pub start_date: NaiveDate,
    pub currency: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_length() {
        assert_eq!(PackageLength::try_from(3).unwrap().months(), 3);
        assert_eq!(PackageLength::try_from(2), Err(2));
        assert_eq!(PackageLength::try_from(12), Err(12));
    }

    #[test]
    fn test_series_status_parse() {
        assert_eq!(SeriesStatus::parse("pending"), SeriesStatus::Pending);
        assert_eq!(SeriesStatus::parse("approved"), SeriesStatus::Approved);
        assert_eq!(SeriesStatus::parse("unknown"), SeriesStatus::Draft);
    }
}
