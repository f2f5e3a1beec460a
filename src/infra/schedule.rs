//! Daily trigger times in the operational timezone.
//!
//! Schedules are written as cron expressions restricted to a fixed minute and
//! hour: `"M H * * *"`.

use std::str::FromStr;

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::app_error::AppError;

/// Longest DST gap we step over when the configured local time doesn't exist.
const MAX_GAP_MINUTES: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Result<Self, AppError> {
        if hour > 23 || minute > 59 {
            return Err(AppError::Config(format!(
                "Invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// First firing strictly after `now`, as seen on the wall clock of `tz`.
    ///
    /// A time skipped by a DST jump fires at the first valid local minute after
    /// it; a repeated time fires on its first occurrence.
    pub fn next_after<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
        let today = now.with_timezone(tz).date_naive();

        for offset in 0..=2 {
            let Some(day) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            if let Some(fire_at) = self.local_firing(day, tz) {
                if fire_at > now {
                    return fire_at;
                }
            }
        }

        now + Duration::days(1)
    }

    fn local_firing<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
        let wall: NaiveDateTime = day.and_hms_opt(self.hour, self.minute, 0)?;
        for shift in 0..=MAX_GAP_MINUTES {
            let candidate = wall + Duration::minutes(shift);
            match tz.from_local_datetime(&candidate) {
                LocalResult::Single(t) => return Some(t.with_timezone(&Utc)),
                LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
                LocalResult::None => continue,
            }
        }
        None
    }
}

impl FromStr for DailySchedule {
    type Err = AppError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(AppError::Config(format!(
                "Schedule '{expr}' must have 5 fields: 'M H * * *'"
            )));
        };

        if [day, month, weekday].iter().any(|f| **f != "*") {
            return Err(AppError::Config(format!(
                "Schedule '{expr}' must run daily: day, month and weekday fields must be '*'"
            )));
        }

        let parse = |field: &str, name: &str| {
            field.parse::<u32>().map_err(|_| {
                AppError::Config(format!(
                    "Schedule '{expr}' needs a fixed {name}, got '{field}'"
                ))
            })
        };

        DailySchedule::new(parse(*hour, "hour")?, parse(*minute, "minute")?)
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} * * *", self.minute, self.hour)
    }
}
