//! Reading streaks
//!
//! A streak is the number of consecutive local calendar days, ending today or
//! yesterday, on which at least one session *started*. A session that runs past
//! midnight only counts for the day it began on.

use super::calendar::local_date;
use crate::types::ReadingSession;
use chrono::{Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reduce sessions to the set of local days on which one started.
pub fn activity_days<Tz: TimeZone>(sessions: &[ReadingSession], tz: &Tz) -> BTreeSet<NaiveDate> {
    sessions
        .iter()
        .map(|s| local_date(s.started_at, tz))
        .collect()
}

/// Current streak counting back from `today`.
///
/// If today has no activity the streak may still be alive from yesterday; if
/// yesterday is empty too, the streak is 0 no matter what came before.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> i64 {
    let yesterday = today - Duration::days(1);
    let anchor = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0i64;
    let mut day = anchor;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Longest run of consecutive days anywhere in `days`.
pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> i64 {
    let mut longest = 0i64;
    let mut run = 0i64;
    let mut prev: Option<NaiveDate> = None;

    // BTreeSet iterates in ascending order
    for &day in days {
        run = match prev {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }
    longest
}

/// Streak statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    /// Consecutive days ending today or yesterday
    pub current: i64,
    /// Longest run ever
    pub longest: i64,
    /// Distinct days with at least one session
    pub active_days: i64,
}

impl StreakStats {
    pub fn from_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Self {
        Self {
            current: current_streak(days, today),
            longest: longest_streak(days),
            active_days: days.len() as i64,
        }
    }

    /// Compute streaks directly from sessions, localized to `tz`.
    pub fn from_sessions<Tz: TimeZone>(
        sessions: &[ReadingSession],
        tz: &Tz,
        today: NaiveDate,
    ) -> Self {
        Self::from_days(&activity_days(sessions, tz), today)
    }
}
