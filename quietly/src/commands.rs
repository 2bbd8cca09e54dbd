//! Command implementations for the `quietly` binary
//!
//! Every command follows the same shape: load the records it needs from the
//! database, call into the engine with the current instant, store what comes
//! back and print it.

use crate::OutputFormat;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use quietly_core::analytics::{self, BookStats, GoalProgress, GoalWindows, ReadingStats, StreakStats};
use quietly_core::export::{JsonFileSink, SnapshotSink, WidgetSnapshot};
use quietly_core::format::{format_minutes, format_timer, progress_bar};
use quietly_core::{
    session, Book, BookStatus, Clock, Config, Database, Error, GoalType, ReadingSession,
    SessionFilter, SessionState, SessionTimer, SystemClock, UserBook,
};
use serde::Serialize;
use std::path::PathBuf;

const BAR_WIDTH: usize = 20;

pub struct App {
    db: Database,
    config: Config,
    format: OutputFormat,
    timer: SessionTimer<SystemClock>,
}

impl App {
    pub fn new(db: Database, config: Config, format: OutputFormat) -> Self {
        Self {
            db,
            config,
            format,
            timer: SessionTimer::new(SystemClock),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.timer.clock().now()
    }

    fn windows(&self, now: DateTime<Utc>) -> Result<GoalWindows> {
        GoalWindows::resolve(&now.with_timezone(&Local), self.config.calendar.week_start)
            .context("failed to resolve goal windows")
    }

    fn require_book(&self, id: &str) -> Result<Book> {
        match self.db.get_book(id)? {
            Some(book) => Ok(book),
            None => Err(Error::not_found("book", id).into()),
        }
    }

    fn user_book(&self, id: &str) -> Result<UserBook> {
        Ok(self
            .db
            .get_user_book(id)?
            .unwrap_or_else(|| UserBook::new(id)))
    }

    fn active_for(&self, book_id: &str) -> Result<ReadingSession> {
        let active = self.db.active_sessions()?;
        match session::active_for_book(&active, book_id) {
            Some(s) => Ok(s.clone()),
            None => Err(Error::invalid_state(format!("no active session for book {}", book_id)).into()),
        }
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    // ============================================
    // Books
    // ============================================

    pub fn add_book(
        &self,
        title: String,
        id: Option<String>,
        author: Option<String>,
        pages: Option<i32>,
    ) -> Result<()> {
        if let Some(p) = pages {
            if p <= 0 {
                bail!("page count must be positive (got {})", p);
            }
        }
        let id = match id {
            Some(id) => id,
            None => slugify(&title),
        };
        if id.is_empty() {
            bail!("cannot derive a book ID from {:?}; pass --id", title);
        }

        let book = Book {
            id,
            title,
            author,
            page_count: pages,
        };
        self.db.upsert_book(&book).context("failed to save book")?;
        if self.db.get_user_book(&book.id)?.is_none() {
            self.db.upsert_user_book(&UserBook::new(book.id.as_str()))?;
        }
        tracing::info!(book_id = %book.id, "Book saved");

        match self.format {
            OutputFormat::Json => self.print_json(&book),
            OutputFormat::Text => {
                println!("Added {} ({})", book.title, book.id);
                Ok(())
            }
        }
    }

    pub fn list_books(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Row {
            #[serde(flatten)]
            book: Book,
            status: BookStatus,
            current_page: Option<i32>,
        }

        let rows: Vec<Row> = self
            .db
            .list_books()?
            .into_iter()
            .map(|book| -> Result<Row> {
                let user_book = self.user_book(&book.id)?;
                Ok(Row {
                    book,
                    status: user_book.status,
                    current_page: user_book.current_page,
                })
            })
            .collect::<Result<_>>()?;

        if self.format == OutputFormat::Json {
            return self.print_json(&rows);
        }

        if rows.is_empty() {
            println!("No books yet. Add one with `quietly book add <title>`.");
            return Ok(());
        }
        for row in &rows {
            let author = row.book.author.as_deref().unwrap_or("unknown author");
            let progress = match (row.current_page, row.book.page_count) {
                (Some(page), Some(count)) => format!("  p.{}/{}", page, count),
                (Some(page), None) => format!("  p.{}", page),
                _ => String::new(),
            };
            println!(
                "{:<20} {:<14} {} - {}{}",
                row.book.id,
                row.status.display_name(),
                row.book.title,
                author,
                progress
            );
        }
        Ok(())
    }

    pub fn set_book_status(&self, book_id: &str, status: BookStatus) -> Result<()> {
        self.require_book(book_id)?;
        let now = self.now();
        let mut user_book = self.user_book(book_id)?;
        match status {
            BookStatus::WantToRead => {
                user_book.status = BookStatus::WantToRead;
                user_book.completed_at = None;
            }
            BookStatus::Reading => user_book.mark_reading(now),
            BookStatus::Completed => user_book.mark_completed(now),
        }
        self.db.upsert_user_book(&user_book)?;
        tracing::info!(book_id, status = status.as_str(), "Shelf status changed");

        match self.format {
            OutputFormat::Json => self.print_json(&user_book),
            OutputFormat::Text => {
                println!("{} is now {}", book_id, status.display_name());
                Ok(())
            }
        }
    }

    // ============================================
    // Sessions
    // ============================================

    pub fn start(&self, book_id: &str, page: Option<i32>) -> Result<()> {
        let book = self.require_book(book_id)?;
        let active = self.db.active_sessions()?;
        let s = self.timer.start(&active, &book.id, page)?;

        let mut user_book = self.user_book(&book.id)?;
        if let Some(p) = page {
            user_book.record_page(p, book.page_count)?;
        }
        if user_book.status != BookStatus::Reading {
            user_book.mark_reading(s.started_at);
        }

        self.db
            .record_start(&s, &user_book)
            .context("failed to save session")?;
        tracing::info!(session_id = %s.id, book_id, "Session started");

        self.report_session(&book, &s, "Started")
    }

    pub fn pause(&self, book_id: &str) -> Result<()> {
        let book = self.require_book(book_id)?;
        let s = self.timer.pause(&self.active_for(book_id)?)?;
        self.db.update_session(&s)?;
        tracing::info!(session_id = %s.id, book_id, "Session paused");

        self.report_session(&book, &s, "Paused")
    }

    pub fn resume(&self, book_id: &str) -> Result<()> {
        let book = self.require_book(book_id)?;
        let s = self.timer.resume(&self.active_for(book_id)?)?;
        self.db.update_session(&s)?;
        tracing::info!(session_id = %s.id, book_id, "Session resumed");

        self.report_session(&book, &s, "Resumed")
    }

    pub fn end(&self, book_id: &str, page: Option<i32>, notes: Option<String>) -> Result<()> {
        let book = self.require_book(book_id)?;
        let s = self.timer.end(&self.active_for(book_id)?, page, notes)?;
        let ended_at = s.ended_at.unwrap_or(s.started_at);

        let mut user_book = self.user_book(book_id)?;
        if let Some(p) = page {
            user_book.record_page(p, book.page_count)?;
            if book.page_count == Some(p) {
                user_book.mark_completed(ended_at);
            }
        }

        self.db
            .record_transition(&s, &user_book)
            .context("failed to save session")?;
        tracing::info!(
            session_id = %s.id,
            book_id,
            duration_seconds = s.duration_seconds.unwrap_or(0),
            pages_read = s.pages_read.unwrap_or(0),
            "Session ended"
        );

        if self.format == OutputFormat::Json {
            return self.print_json(&s);
        }
        let seconds = s.duration_seconds.unwrap_or(0);
        print!("Finished {} after {}", book.title, format_timer(seconds));
        match s.pages_read {
            Some(pages) => println!(", {} pages", pages),
            None => println!(),
        }
        if user_book.status == BookStatus::Completed {
            println!("Marked {} as completed.", book.title);
        }
        Ok(())
    }

    fn report_session(&self, book: &Book, s: &ReadingSession, verb: &str) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.print_json(s);
        }
        println!(
            "{} {} ({})",
            verb,
            book.title,
            format_timer(self.timer.elapsed_seconds(s))
        );
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        let now = self.now();
        let active = self.db.active_sessions()?;
        let snapshots: Vec<_> = active
            .iter()
            .map(|s| quietly_core::export::ActiveSessionSnapshot::capture(s, now))
            .collect();

        if self.format == OutputFormat::Json {
            return self.print_json(&snapshots);
        }
        if snapshots.is_empty() {
            println!("No active sessions.");
            let last = self.db.list_sessions(&SessionFilter {
                limit: Some(1),
                ..Default::default()
            })?;
            if let Some(s) = last.first() {
                let title = self
                    .db
                    .get_book(&s.book_id)?
                    .map(|b| b.title)
                    .unwrap_or_else(|| s.book_id.clone());
                println!(
                    "Last read {} for {} on {}",
                    title,
                    format_timer(s.duration_seconds.unwrap_or(0)),
                    s.started_at.with_timezone(&Local).format("%Y-%m-%d")
                );
            }
            return Ok(());
        }
        for snap in &snapshots {
            let title = self
                .db
                .get_book(&snap.book_id)?
                .map(|b| b.title)
                .unwrap_or_else(|| snap.book_id.clone());
            let marker = match snap.state {
                SessionState::Paused => " (paused)",
                _ => "",
            };
            println!(
                "{:>9}  {}{}",
                format_timer(snap.elapsed_seconds),
                title,
                marker
            );
        }
        Ok(())
    }

    // ============================================
    // Goals
    // ============================================

    fn goal_progress(&self, now: DateTime<Utc>) -> Result<Vec<GoalProgress>> {
        let windows = self.windows(now)?;
        let goals = self.db.list_goals()?;
        let since = goals
            .iter()
            .map(|g| windows.start_for(g.goal_type))
            .min();

        // Only minute goals read sessions; fetch back to the widest window
        let sessions = match since {
            Some(since) => self.db.list_sessions(&SessionFilter {
                since: Some(since),
                ..Default::default()
            })?,
            None => Vec::new(),
        };
        let user_books = self.db.list_user_books()?;

        Ok(analytics::progress_for_all(
            &goals,
            &sessions,
            &user_books,
            &windows,
        ))
    }

    pub fn set_goal(&self, goal_type: GoalType, target: i32) -> Result<()> {
        let now = self.now();
        let mut goals = self.db.list_goals()?;
        let goal = analytics::upsert_goal(&mut goals, goal_type, target, now)?;
        self.db.upsert_goal(&goal).context("failed to save goal")?;
        tracing::info!(goal_type = goal_type.as_str(), target, "Goal set");

        match self.format {
            OutputFormat::Json => self.print_json(&goal),
            OutputFormat::Text => {
                println!(
                    "{}: {} {}",
                    goal_type.display_name(),
                    target,
                    goal_type.unit()
                );
                Ok(())
            }
        }
    }

    pub fn list_goals(&self) -> Result<()> {
        let progress = self.goal_progress(self.now())?;

        if self.format == OutputFormat::Json {
            let snapshots: Vec<_> = progress
                .iter()
                .map(quietly_core::export::GoalSnapshot::from)
                .collect();
            return self.print_json(&snapshots);
        }
        if progress.is_empty() {
            println!("No goals set. Try `quietly goal set daily_minutes 30`.");
            return Ok(());
        }
        for p in &progress {
            let left = if p.is_complete() {
                "done".to_string()
            } else {
                format!("{} to go", p.remaining())
            };
            println!(
                "{:<16} {} {:>3}%  {}/{} {} ({})",
                p.goal.goal_type.display_name(),
                progress_bar(p.progress(), BAR_WIDTH),
                p.progress_percentage(),
                p.current_value,
                p.target_value,
                p.goal.goal_type.unit(),
                left
            );
        }
        Ok(())
    }

    pub fn remove_goal(&self, goal_type: GoalType) -> Result<()> {
        let mut goals = self.db.list_goals()?;
        let removed = analytics::remove_goal(&mut goals, goal_type)?;
        self.db.delete_goal(goal_type)?;
        tracing::info!(goal_type = goal_type.as_str(), "Goal removed");

        match self.format {
            OutputFormat::Json => self.print_json(&removed),
            OutputFormat::Text => {
                println!("Removed {} goal", goal_type.display_name());
                Ok(())
            }
        }
    }

    // ============================================
    // Stats
    // ============================================

    fn reading_stats(&self, now: DateTime<Utc>) -> Result<(ReadingStats, Vec<ReadingSession>)> {
        let sessions = self.db.list_sessions(&SessionFilter::default())?;
        let user_books = self.db.list_user_books()?;
        let today = now.with_timezone(&Local).date_naive();
        let streaks = StreakStats::from_sessions(&sessions, &Local, today);
        Ok((
            ReadingStats::aggregate(&sessions, &user_books, streaks),
            sessions,
        ))
    }

    pub fn stats(&self) -> Result<()> {
        let (stats, _) = self.reading_stats(self.now())?;

        if self.format == OutputFormat::Json {
            return self.print_json(&stats);
        }
        println!("READING STATS");
        println!("  Sessions:        {}", stats.total_sessions);
        println!("  Time read:       {}", format_minutes(stats.total_minutes));
        println!("  Pages read:      {}", stats.total_pages);
        println!(
            "  Pace:            {:.2} pages/min",
            stats.average_pages_per_minute
        );
        println!(
            "  Books:           {} total, {} reading, {} completed, {} want to read",
            stats.total_books, stats.reading_books, stats.completed_books, stats.want_to_read_books
        );
        println!(
            "  Streak:          {} days (longest {})",
            stats.current_streak, stats.longest_streak
        );
        Ok(())
    }

    pub fn book_stats(&self, book_id: &str) -> Result<()> {
        let book = self.require_book(book_id)?;
        let user_book = self.db.get_user_book(book_id)?;
        let sessions = self.db.list_sessions(&SessionFilter {
            book_id: Some(book_id.to_string()),
            ..Default::default()
        })?;
        let stats = BookStats::compute(&book, user_book.as_ref(), &sessions);

        if self.format == OutputFormat::Json {
            return self.print_json(&stats);
        }
        println!("{}", book.title);
        if let Some(status) = stats.status {
            println!("  Status:          {}", status.display_name());
        }
        println!("  Sessions:        {}", stats.totals.sessions);
        println!(
            "  Time read:       {}",
            format_minutes(stats.totals.total_minutes())
        );
        println!("  Pages read:      {}", stats.totals.total_pages);
        println!("  Pace:            {:.2} pages/min", stats.pages_per_minute);
        if let Some(percent) = stats.percent_complete {
            println!(
                "  Progress:        {} {}%",
                progress_bar(percent as f64 / 100.0, BAR_WIDTH),
                percent
            );
        }
        Ok(())
    }

    pub fn streak(&self) -> Result<()> {
        let now = self.now();
        let sessions = self.db.list_sessions(&SessionFilter::default())?;
        let today = now.with_timezone(&Local).date_naive();
        let streaks = StreakStats::from_sessions(&sessions, &Local, today);

        match self.format {
            OutputFormat::Json => self.print_json(&streaks),
            OutputFormat::Text => {
                let days = |n: i64| if n == 1 { "day" } else { "days" };
                println!("Current streak: {} {}", streaks.current, days(streaks.current));
                println!("Longest streak: {} {}", streaks.longest, days(streaks.longest));
                println!("Days with reading: {}", streaks.active_days);
                Ok(())
            }
        }
    }

    // ============================================
    // Export
    // ============================================

    pub fn export(&self, out: Option<PathBuf>) -> Result<()> {
        let now = self.now();
        let (stats, sessions) = self.reading_stats(now)?;
        let goals = self.goal_progress(now)?;
        let snapshot = WidgetSnapshot::build(now, stats, &goals, &sessions);

        let sink = JsonFileSink::new(out.unwrap_or_else(|| self.config.export.snapshot_path()));
        sink.publish(&snapshot)
            .with_context(|| format!("failed to write snapshot to {}", sink.path().display()))?;
        tracing::info!(path = %sink.path().display(), "Snapshot exported");

        println!("Wrote snapshot to {}", sink.path().display());
        Ok(())
    }
}

/// Lowercase ASCII words of `title` joined with `-`.
fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
