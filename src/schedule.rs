use crate::error::{LightError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Weekday working hours that gate the idle policy
///
/// Working time is Monday to Friday, `start_hour <= hour < end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSchedule {
    start_hour: u32,
    end_hour: u32,
}

impl WorkSchedule {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(LightError::InvalidConfig(format!(
                "work hours {start_hour}..{end_hour} are not a valid window"
            )));
        }
        Ok(Self { start_hour, end_hour })
    }

    pub fn is_worktime(&self, at: NaiveDateTime) -> bool {
        let weekday = at.weekday().num_days_from_monday();
        weekday < 5 && (self.start_hour..self.end_hour).contains(&at.hour())
    }
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self { start_hour: 8, end_hour: 18 }
    }
}
