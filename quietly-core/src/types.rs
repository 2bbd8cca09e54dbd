//! Core domain types for quietly
//!
//! These are plain records owned by the caller's persistence layer. Engine
//! functions borrow them and return new values; nothing here performs I/O.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Book** | A catalogue entry (title, author, page count) |
//! | **UserBook** | The reader's shelf status for one book |
//! | **ReadingSession** | One sitting with a book, from start to end, possibly paused |
//! | **Active session** | A session whose `ended_at` is still `None` |
//! | **Pause fold** | Adding an in-progress pause into `total_paused_seconds` |
//! | **ReadingGoal** | A target for one [`GoalType`]; the type is the natural key |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Books
// ============================================

/// A book in the reader's catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier
    pub id: String,
    /// Title as displayed
    pub title: String,
    /// Author display string (optional)
    pub author: Option<String>,
    /// Number of pages, when known
    pub page_count: Option<i32>,
}

/// Shelf status of a book for the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    WantToRead,
    Reading,
    Completed,
}

impl BookStatus {
    /// Returns the identifier used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::WantToRead => "want_to_read",
            BookStatus::Reading => "reading",
            BookStatus::Completed => "completed",
        }
    }

    /// Returns the display name for this status
    pub fn display_name(&self) -> &'static str {
        match self {
            BookStatus::WantToRead => "Want to Read",
            BookStatus::Reading => "Reading",
            BookStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "want_to_read" | "want" => Ok(BookStatus::WantToRead),
            "reading" => Ok(BookStatus::Reading),
            "completed" | "done" => Ok(BookStatus::Completed),
            _ => Err(format!("unknown book status: {}", s)),
        }
    }
}

/// The reader's status record for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBook {
    /// FK to books
    pub book_id: String,
    /// Current shelf status
    pub status: BookStatus,
    /// Last page the reader reached
    pub current_page: Option<i32>,
    /// When the reader first started the book
    pub started_at: Option<DateTime<Utc>>,
    /// When the book was marked completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserBook {
    /// A fresh shelf entry in `want_to_read`.
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            status: BookStatus::WantToRead,
            current_page: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Move the book to `reading`, stamping `started_at` the first time.
    ///
    /// A completed book goes back to `reading` (a re-read) and loses its
    /// completion timestamp, so it no longer counts toward book goals.
    pub fn mark_reading(&mut self, now: DateTime<Utc>) {
        self.status = BookStatus::Reading;
        self.completed_at = None;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Mark the book completed at `now`.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = BookStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Record the page the reader has reached.
    pub fn record_page(&mut self, page: i32, page_count: Option<i32>) -> crate::Result<()> {
        if page < 0 {
            return Err(crate::Error::invalid_input(format!(
                "page must not be negative (got {})",
                page
            )));
        }
        if let Some(count) = page_count {
            if page > count {
                return Err(crate::Error::invalid_input(format!(
                    "page {} is beyond the last page ({})",
                    page, count
                )));
            }
        }
        self.current_page = Some(page);
        Ok(())
    }
}

// ============================================
// Sessions
// ============================================

/// State of a reading session, derived from its timestamps.
///
/// There is no `NotStarted` variant: a session that has not started has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    Paused,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sitting with a book.
///
/// Elapsed time is never stored while the session is active; it is recomputed
/// from `started_at`, `paused_at` and `total_paused_seconds` so that a session
/// survives a process restart. See [`crate::session`] for the transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSession {
    /// Unique identifier
    pub id: String,
    /// FK to books
    pub book_id: String,
    /// When reading started
    pub started_at: DateTime<Utc>,
    /// When the session ended (`None` while active)
    pub ended_at: Option<DateTime<Utc>>,
    /// When the current pause began (`None` unless paused)
    pub paused_at: Option<DateTime<Utc>>,
    /// Accumulated seconds spent in completed pauses
    pub total_paused_seconds: i64,
    /// Page the reader started on
    pub start_page: Option<i32>,
    /// Page the reader stopped on
    pub end_page: Option<i32>,
    /// Pages read, set when the session ends with both pages known
    pub pages_read: Option<i32>,
    /// Net reading time, set only when the session ends
    pub duration_seconds: Option<i64>,
    /// Free-form notes captured at the end of the session
    pub notes: Option<String>,
}

impl ReadingSession {
    /// Current state derived from the timestamps.
    pub fn state(&self) -> SessionState {
        if self.ended_at.is_some() {
            SessionState::Ended
        } else if self.paused_at.is_some() {
            SessionState::Paused
        } else {
            SessionState::Running
        }
    }

    /// Whether the session has not ended yet.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.is_active() && self.paused_at.is_some()
    }
}

// ============================================
// Goals
// ============================================

/// Kind of reading goal. Each type may have at most one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Minutes read since local midnight
    DailyMinutes,
    /// Minutes read since the start of the calendar week
    WeeklyMinutes,
    /// Books completed since the first of the month
    BooksPerMonth,
    /// Books completed since January 1st
    BooksPerYear,
}

impl GoalType {
    /// All goal types, in display order.
    pub const ALL: [GoalType; 4] = [
        GoalType::DailyMinutes,
        GoalType::WeeklyMinutes,
        GoalType::BooksPerMonth,
        GoalType::BooksPerYear,
    ];

    /// Returns the identifier used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::DailyMinutes => "daily_minutes",
            GoalType::WeeklyMinutes => "weekly_minutes",
            GoalType::BooksPerMonth => "books_per_month",
            GoalType::BooksPerYear => "books_per_year",
        }
    }

    /// Returns the display name for this goal type
    pub fn display_name(&self) -> &'static str {
        match self {
            GoalType::DailyMinutes => "Daily reading",
            GoalType::WeeklyMinutes => "Weekly reading",
            GoalType::BooksPerMonth => "Books this month",
            GoalType::BooksPerYear => "Books this year",
        }
    }

    /// Unit of the goal's value ("min" or "books").
    pub fn unit(&self) -> &'static str {
        match self {
            GoalType::DailyMinutes | GoalType::WeeklyMinutes => "min",
            GoalType::BooksPerMonth | GoalType::BooksPerYear => "books",
        }
    }

    /// Whether progress is measured in reading minutes (vs. completed books).
    pub fn is_time_based(&self) -> bool {
        matches!(self, GoalType::DailyMinutes | GoalType::WeeklyMinutes)
    }
}

impl std::fmt::Display for GoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily_minutes" | "daily" => Ok(GoalType::DailyMinutes),
            "weekly_minutes" | "weekly" => Ok(GoalType::WeeklyMinutes),
            "books_per_month" | "monthly" => Ok(GoalType::BooksPerMonth),
            "books_per_year" | "yearly" => Ok(GoalType::BooksPerYear),
            _ => Err(format!("unknown goal type: {}", s)),
        }
    }
}

/// A reading goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingGoal {
    /// Unique identifier
    pub id: String,
    /// Natural key: at most one goal per type
    pub goal_type: GoalType,
    /// Target value (minutes or books), always positive
    pub target_value: i32,
    /// When the goal was first created
    pub created_at: DateTime<Utc>,
    /// When the target was last changed
    pub updated_at: DateTime<Utc>,
}
