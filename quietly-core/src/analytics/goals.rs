//! Goal progress
//!
//! Maps each [`ReadingGoal`] to a current value over its goal window:
//!
//! | goal type | window | current value |
//! |-----------|--------|---------------|
//! | `daily_minutes` | start of today | minutes of sessions started in window |
//! | `weekly_minutes` | start of week | minutes of sessions started in window |
//! | `books_per_month` | start of month | books completed in window |
//! | `books_per_year` | start of year | books completed in window |
//!
//! Minute goals sum `duration_seconds` of the matching sessions and floor the
//! total once; active sessions have no duration yet and contribute nothing.
//! Book goals filter on `completed_at` alone, regardless of when the sessions
//! that finished the book started.

use super::calendar::GoalWindows;
use crate::error::{Error, Result};
use crate::types::{BookStatus, GoalType, ReadingGoal, ReadingSession, UserBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one goal at one instant. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal: ReadingGoal,
    pub current_value: i64,
    pub target_value: i64,
}

impl GoalProgress {
    pub fn new(goal: ReadingGoal, current_value: i64) -> Self {
        let target_value = goal.target_value as i64;
        Self {
            goal,
            current_value,
            target_value,
        }
    }

    /// Fraction complete, capped at 1.0.
    pub fn progress(&self) -> f64 {
        if self.target_value <= 0 {
            return 0.0;
        }
        (self.current_value as f64 / self.target_value as f64).min(1.0)
    }

    /// Whole percent complete (0-100), floored.
    pub fn progress_percentage(&self) -> u32 {
        if self.target_value <= 0 {
            return 0;
        }
        (self.current_value.clamp(0, self.target_value) * 100 / self.target_value) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.current_value >= self.target_value
    }

    /// Amount still needed to hit the target (0 once complete).
    pub fn remaining(&self) -> i64 {
        (self.target_value - self.current_value).max(0)
    }
}

/// Whole minutes read in sessions that started at or after `since`.
pub fn minutes_since(sessions: &[ReadingSession], since: DateTime<Utc>) -> i64 {
    let seconds: i64 = sessions
        .iter()
        .filter(|s| s.started_at >= since)
        .filter_map(|s| s.duration_seconds)
        .sum();
    seconds / 60
}

/// Books completed at or after `since`.
pub fn books_completed_since(user_books: &[UserBook], since: DateTime<Utc>) -> i64 {
    user_books
        .iter()
        .filter(|b| b.status == BookStatus::Completed)
        .filter(|b| b.completed_at.is_some_and(|at| at >= since))
        .count() as i64
}

/// Current value of `goal_type` over its window.
pub fn current_value(
    goal_type: GoalType,
    sessions: &[ReadingSession],
    user_books: &[UserBook],
    windows: &GoalWindows,
) -> i64 {
    let since = windows.start_for(goal_type);
    if goal_type.is_time_based() {
        minutes_since(sessions, since)
    } else {
        books_completed_since(user_books, since)
    }
}

/// Progress for a single goal.
pub fn progress_for(
    goal: &ReadingGoal,
    sessions: &[ReadingSession],
    user_books: &[UserBook],
    windows: &GoalWindows,
) -> GoalProgress {
    GoalProgress::new(
        goal.clone(),
        current_value(goal.goal_type, sessions, user_books, windows),
    )
}

/// Progress for every goal, in [`GoalType::ALL`] order.
pub fn progress_for_all(
    goals: &[ReadingGoal],
    sessions: &[ReadingSession],
    user_books: &[UserBook],
    windows: &GoalWindows,
) -> Vec<GoalProgress> {
    let mut sorted: Vec<&ReadingGoal> = goals.iter().collect();
    sorted.sort_by_key(|g| g.goal_type);
    sorted
        .into_iter()
        .map(|g| progress_for(g, sessions, user_books, windows))
        .collect()
}

/// Look up the goal of a given type.
pub fn find_goal(goals: &[ReadingGoal], goal_type: GoalType) -> Result<&ReadingGoal> {
    goals
        .iter()
        .find(|g| g.goal_type == goal_type)
        .ok_or_else(|| Error::not_found("goal", goal_type.as_str()))
}

/// Insert a goal, or update the target of the existing goal of that type.
///
/// `goal_type` is the natural key: a second goal of the same type never
/// creates a new record.
pub fn upsert_goal(
    goals: &mut Vec<ReadingGoal>,
    goal_type: GoalType,
    target_value: i32,
    now: DateTime<Utc>,
) -> Result<ReadingGoal> {
    if target_value <= 0 {
        return Err(Error::invalid_input(format!(
            "goal target must be positive (got {})",
            target_value
        )));
    }

    if let Some(existing) = goals.iter_mut().find(|g| g.goal_type == goal_type) {
        existing.target_value = target_value;
        existing.updated_at = now;
        return Ok(existing.clone());
    }

    let goal = ReadingGoal {
        id: uuid::Uuid::new_v4().to_string(),
        goal_type,
        target_value,
        created_at: now,
        updated_at: now,
    };
    goals.push(goal.clone());
    Ok(goal)
}

/// Remove the goal of a given type, returning it.
pub fn remove_goal(goals: &mut Vec<ReadingGoal>, goal_type: GoalType) -> Result<ReadingGoal> {
    let idx = goals
        .iter()
        .position(|g| g.goal_type == goal_type)
        .ok_or_else(|| Error::not_found("goal", goal_type.as_str()))?;
    Ok(goals.remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::calendar::WeekStart;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        // Thursday afternoon
        Utc.with_ymd_and_hms(2024, 5, 16, 15, 0, 0).unwrap()
    }

    fn windows() -> GoalWindows {
        GoalWindows::resolve(&now(), WeekStart::Monday).unwrap()
    }

    fn goal(goal_type: GoalType, target_value: i32) -> ReadingGoal {
        ReadingGoal {
            id: format!("goal-{}", goal_type),
            goal_type,
            target_value,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn finished(started_at: DateTime<Utc>, duration_seconds: i64) -> ReadingSession {
        ReadingSession {
            id: format!("s-{}", started_at.timestamp()),
            book_id: "book-1".to_string(),
            started_at,
            ended_at: Some(started_at + Duration::seconds(duration_seconds)),
            paused_at: None,
            total_paused_seconds: 0,
            start_page: None,
            end_page: None,
            pages_read: None,
            duration_seconds: Some(duration_seconds),
            notes: None,
        }
    }

    fn completed(book_id: &str, at: DateTime<Utc>) -> UserBook {
        UserBook {
            book_id: book_id.to_string(),
            status: BookStatus::Completed,
            current_page: None,
            started_at: None,
            completed_at: Some(at),
        }
    }

    #[test]
    fn test_daily_goal_complete() {
        let sessions = vec![finished(now() - Duration::hours(2), 1800)];
        let p = progress_for(&goal(GoalType::DailyMinutes, 30), &sessions, &[], &windows());

        assert_eq!(p.current_value, 30);
        assert_eq!(p.progress(), 1.0);
        assert_eq!(p.progress_percentage(), 100);
        assert!(p.is_complete());
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn test_daily_goal_without_sessions() {
        let p = progress_for(&goal(GoalType::DailyMinutes, 30), &[], &[], &windows());
        assert_eq!(p.current_value, 0);
        assert_eq!(p.progress(), 0.0);
        assert!(!p.is_complete());
    }

    #[test]
    fn test_minutes_are_floored_after_summing() {
        // 59s + 61s = 120s = 2 min (per-session flooring would give 1)
        let sessions = vec![
            finished(now() - Duration::hours(3), 59),
            finished(now() - Duration::hours(1), 61),
        ];
        assert_eq!(minutes_since(&sessions, windows().day_start), 2);
    }

    #[test]
    fn test_progress_is_capped_and_percentage_floored() {
        let p = GoalProgress::new(goal(GoalType::DailyMinutes, 30), 45);
        assert_eq!(p.progress(), 1.0);
        assert!(p.is_complete());

        let p = GoalProgress::new(goal(GoalType::DailyMinutes, 3), 2);
        assert_eq!(p.progress_percentage(), 66);
    }

    #[test]
    fn test_percentage_is_exact_for_whole_percents() {
        for current in 0..=100 {
            let p = GoalProgress::new(goal(GoalType::WeeklyMinutes, 100), current);
            assert_eq!(p.progress_percentage() as i64, current);
        }
        let p = GoalProgress::new(goal(GoalType::WeeklyMinutes, 100), 29);
        assert_eq!(p.progress_percentage(), 29);
        assert_eq!(p.remaining(), 71);

        let p = GoalProgress::new(goal(GoalType::BooksPerYear, 12), -4);
        assert_eq!(p.progress_percentage(), 0);
    }

    #[test]
    fn test_weekly_window_excludes_last_week() {
        let w = windows();
        let sessions = vec![
            // Monday this week
            finished(w.week_start + Duration::hours(9), 1200),
            // Sunday last week
            finished(w.week_start - Duration::hours(2), 3600),
            // Today
            finished(now() - Duration::minutes(30), 600),
        ];
        let p = progress_for(&goal(GoalType::WeeklyMinutes, 150), &sessions, &[], &w);
        assert_eq!(p.current_value, 30);
        assert_eq!(p.progress_percentage(), 20);
    }

    #[test]
    fn test_active_sessions_do_not_count() {
        let mut active = finished(now() - Duration::minutes(20), 0);
        active.ended_at = None;
        active.duration_seconds = None;
        assert_eq!(minutes_since(&[active], windows().day_start), 0);
    }

    #[test]
    fn test_book_goals_filter_on_completed_at() {
        let w = windows();
        let books = vec![
            completed("a", Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()),
            completed("b", Utc.with_ymd_and_hms(2024, 4, 28, 10, 0, 0).unwrap()),
            completed("c", Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()),
            UserBook::new("d"),
        ];

        let monthly = progress_for(&goal(GoalType::BooksPerMonth, 2), &[], &books, &w);
        assert_eq!(monthly.current_value, 1);
        assert!(!monthly.is_complete());

        let yearly = progress_for(&goal(GoalType::BooksPerYear, 12), &[], &books, &w);
        assert_eq!(yearly.current_value, 2);
    }

    #[test]
    fn test_completed_status_required() {
        let mut book = completed("a", now());
        book.status = BookStatus::Reading;
        assert_eq!(books_completed_since(&[book], windows().year_start), 0);
    }

    #[test]
    fn test_upsert_replaces_target() {
        let mut goals = Vec::new();
        let first = upsert_goal(&mut goals, GoalType::DailyMinutes, 20, now()).unwrap();
        let later = now() + Duration::days(1);
        let second = upsert_goal(&mut goals, GoalType::DailyMinutes, 45, later).unwrap();

        assert_eq!(goals.len(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(goals[0].target_value, 45);
        assert_eq!(goals[0].created_at, now());
        assert_eq!(goals[0].updated_at, later);
    }

    #[test]
    fn test_upsert_rejects_non_positive_target() {
        let mut goals = Vec::new();
        assert!(matches!(
            upsert_goal(&mut goals, GoalType::BooksPerYear, 0, now()),
            Err(Error::InvalidInput(_))
        ));
        assert!(goals.is_empty());
    }

    #[test]
    fn test_find_and_remove_goal() {
        let mut goals = vec![goal(GoalType::BooksPerYear, 12)];
        assert!(find_goal(&goals, GoalType::BooksPerYear).is_ok());
        assert!(matches!(
            find_goal(&goals, GoalType::DailyMinutes),
            Err(Error::NotFound { kind: "goal", .. })
        ));

        let removed = remove_goal(&mut goals, GoalType::BooksPerYear).unwrap();
        assert_eq!(removed.target_value, 12);
        assert!(goals.is_empty());
        assert!(remove_goal(&mut goals, GoalType::BooksPerYear).is_err());
    }

    #[test]
    fn test_progress_for_all_is_ordered() {
        let goals = vec![
            goal(GoalType::BooksPerYear, 12),
            goal(GoalType::DailyMinutes, 30),
        ];
        let all = progress_for_all(&goals, &[], &[], &windows());
        let types: Vec<_> = all.iter().map(|p| p.goal.goal_type).collect();
        assert_eq!(types, vec![GoalType::DailyMinutes, GoalType::BooksPerYear]);
    }
}
