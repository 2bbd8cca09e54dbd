//! Calendar policy: local days and goal windows.
//!
//! The engine never asks the platform for "today". Callers resolve the local
//! calendar once, here, and pass the result in as plain values. Everything
//! downstream treats the window starts as opaque instants.

use crate::error::{Error, Result};
use crate::types::GoalType;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

/// Local calendar day on which `instant` falls in `tz`.
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Start of the local day `date` in `tz`, as a UTC instant.
///
/// When midnight is ambiguous (clocks fall back) the earlier instant is used.
/// When midnight does not exist (clocks spring forward over it) the date is
/// rejected rather than guessed.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::invalid_input(format!("no midnight for {}", date)))?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::invalid_input(format!("local midnight does not exist on {}", date)))
}

/// Window starts for every goal type, anchored at one "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalWindows {
    /// The instant the windows were resolved for
    pub now: DateTime<Utc>,
    /// Local calendar date of `now`
    pub today: NaiveDate,
    /// Local midnight today
    pub day_start: DateTime<Utc>,
    /// Local midnight on the first day of this week
    pub week_start: DateTime<Utc>,
    /// Local midnight on the 1st of this month
    pub month_start: DateTime<Utc>,
    /// Local midnight on January 1st of this year
    pub year_start: DateTime<Utc>,
}

impl GoalWindows {
    /// Resolve all windows for `now` in its own time zone.
    pub fn resolve<Tz: TimeZone>(now: &DateTime<Tz>, week_start: WeekStart) -> Result<Self> {
        let tz = now.timezone();
        let today = now.date_naive();

        let offset_into_week = (7 + today.weekday().num_days_from_monday() as i64
            - week_start.weekday().num_days_from_monday() as i64)
            % 7;
        let first_of_week = today - Duration::days(offset_into_week);
        let first_of_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
            .ok_or_else(|| Error::invalid_input(format!("invalid month for {}", today)))?;
        let first_of_year = NaiveDate::from_ymd_opt(today.year(), 1, 1)
            .ok_or_else(|| Error::invalid_input(format!("invalid year for {}", today)))?;

        Ok(Self {
            now: now.with_timezone(&Utc),
            today,
            day_start: start_of_day(today, &tz)?,
            week_start: start_of_day(first_of_week, &tz)?,
            month_start: start_of_day(first_of_month, &tz)?,
            year_start: start_of_day(first_of_year, &tz)?,
        })
    }

    /// Window start used to aggregate `goal_type`.
    pub fn start_for(&self, goal_type: GoalType) -> DateTime<Utc> {
        match goal_type {
            GoalType::DailyMinutes => self.day_start,
            GoalType::WeeklyMinutes => self.week_start,
            GoalType::BooksPerMonth => self.month_start,
            GoalType::BooksPerYear => self.year_start,
        }
    }
}
