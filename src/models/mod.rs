pub mod availability;
pub mod booking;
pub mod field;
pub mod party;
pub mod payment;
pub mod series;
pub mod timeslot;
pub mod user;

pub use availability::{Blackout, WeeklyRule};
pub use booking::{Booking, BookingFlags, BookingStatus, NewBooking};
pub use field::{Field, FieldInput, SportType};
pub use party::Party;
pub use payment::{Payment, PaymentStatus};
pub use series::{NewSeries, PackageLength, Series, SeriesStatus};
pub use timeslot::Timeslot;
pub use user::User;

/// Serde helpers for `HH:MM` wall-clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Accepts `HH:MM` and `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }
}
