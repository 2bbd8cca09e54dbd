//! Reading statistics roll-ups.
//!
//! Pure aggregation over whatever slice of sessions and books the caller
//! passes in. There is no windowing here: filter first for per-period views.

use super::streak::StreakStats;
use crate::types::{Book, BookStatus, ReadingSession, UserBook};
use serde::{Deserialize, Serialize};

/// Session totals shared by the library-wide and per-book views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    /// Number of sessions in the slice (active ones included)
    pub sessions: i64,
    /// Sum of recorded durations, in seconds
    pub total_seconds: i64,
    /// Sum of recorded pages
    pub total_pages: i64,
}

impl SessionTotals {
    pub fn from_sessions(sessions: &[ReadingSession]) -> Self {
        Self {
            sessions: sessions.len() as i64,
            total_seconds: sessions.iter().filter_map(|s| s.duration_seconds).sum(),
            total_pages: sessions
                .iter()
                .filter_map(|s| s.pages_read)
                .map(i64::from)
                .sum(),
        }
    }

    /// Whole minutes read.
    pub fn total_minutes(&self) -> i64 {
        self.total_seconds / 60
    }

    /// Pages per minute; 0 when no time has been recorded.
    pub fn pages_per_minute(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        self.total_pages as f64 / (self.total_seconds as f64 / 60.0)
    }
}

/// Library-wide reading statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingStats {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub total_books: i64,
    pub completed_books: i64,
    pub reading_books: i64,
    pub want_to_read_books: i64,
    pub total_sessions: i64,
    pub total_minutes: i64,
    pub total_pages: i64,
    pub average_pages_per_minute: f64,
}

impl ReadingStats {
    /// Roll up `sessions` and `user_books`, attaching precomputed streaks.
    pub fn aggregate(
        sessions: &[ReadingSession],
        user_books: &[UserBook],
        streaks: StreakStats,
    ) -> Self {
        let totals = SessionTotals::from_sessions(sessions);
        let count = |status: BookStatus| {
            user_books.iter().filter(|b| b.status == status).count() as i64
        };

        Self {
            current_streak: streaks.current,
            longest_streak: streaks.longest,
            total_books: user_books.len() as i64,
            completed_books: count(BookStatus::Completed),
            reading_books: count(BookStatus::Reading),
            want_to_read_books: count(BookStatus::WantToRead),
            total_sessions: totals.sessions,
            total_minutes: totals.total_minutes(),
            total_pages: totals.total_pages,
            average_pages_per_minute: totals.pages_per_minute(),
        }
    }
}

/// Statistics for a single book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    pub book_id: String,
    pub status: Option<BookStatus>,
    pub totals: SessionTotals,
    pub pages_per_minute: f64,
    /// Percent through the book, when both page count and current page are known
    pub percent_complete: Option<u32>,
}

impl BookStats {
    /// Per-book view. Sessions for other books are ignored.
    pub fn compute(book: &Book, user_book: Option<&UserBook>, sessions: &[ReadingSession]) -> Self {
        let own: Vec<ReadingSession> = sessions
            .iter()
            .filter(|s| s.book_id == book.id)
            .cloned()
            .collect();
        let totals = SessionTotals::from_sessions(&own);

        let percent_complete = match (user_book.and_then(|ub| ub.current_page), book.page_count) {
            (Some(page), Some(count)) if count > 0 => {
                Some((i64::from(page.clamp(0, count)) * 100 / i64::from(count)) as u32)
            }
            _ => None,
        };

        Self {
            book_id: book.id.clone(),
            status: user_book.map(|ub| ub.status),
            totals,
            pages_per_minute: totals.pages_per_minute(),
            percent_complete,
        }
    }
}
