pub mod availability;
pub mod calendar;
pub mod gateway;
pub mod payments;
pub mod reporting;
pub mod reservations;
