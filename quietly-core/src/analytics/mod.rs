//! Derived reading metrics
//!
//! Everything here is a pure function of records the caller supplies:
//! - [`calendar`]: local days and goal windows (the one place time zones are handled)
//! - [`streak`]: current and longest reading streaks
//! - [`goals`]: goal progress and goal upserts
//! - [`stats`]: library-wide and per-book roll-ups
//!
//! None of these modules read the clock, touch storage or log.

pub mod calendar;
pub mod goals;
pub mod stats;
pub mod streak;

pub use calendar::{local_date, start_of_day, GoalWindows, WeekStart};
pub use goals::{
    find_goal, progress_for, progress_for_all, remove_goal, upsert_goal, GoalProgress,
};
pub use stats::{BookStats, ReadingStats, SessionTotals};
pub use streak::{activity_days, current_streak, longest_streak, StreakStats};
