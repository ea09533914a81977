use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::services::calendar::slot_label;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeslot {
    pub id: i64,
    #[serde(with = "super::hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "super::hhmm")]
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl Timeslot {
    pub fn label(&self) -> String {
        slot_label(self.start_time, self.end_time)
    }
}
