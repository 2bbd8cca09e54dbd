//! # quietly-core
//!
//! Core library for Quietly - a reading tracker.
//!
//! This library provides:
//! - The reading-session timer (running / paused / ended, net elapsed time)
//! - Derived metrics: streaks, goal progress, reading statistics
//! - Snapshot export for widgets and lock-screen activities
//! - Configuration, logging and a SQLite persistence adapter for front ends
//!
//! ## Architecture
//!
//! The engine ([`session`], [`analytics`], [`export`]) is pure: callers load
//! records, pass them in together with "now" and the calendar windows, and
//! persist whatever new session or goal values come back. The engine performs
//! no I/O and keeps no state between calls, so an active session survives a
//! restart simply by being reloaded.
//!
//! [`db`], [`config`] and [`logging`] are the caller-side pieces used by the
//! `quietly` binary.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use quietly_core::analytics::{self, GoalWindows, WeekStart};
//! use quietly_core::{session, GoalType};
//!
//! let now = Utc.with_ymd_and_hms(2024, 5, 16, 21, 0, 0).unwrap();
//! let s = session::start(&[], "book-1", Some(1), now - Duration::minutes(30)).unwrap();
//! let s = session::end(&s, now, Some(25), None).unwrap();
//!
//! let mut goals = Vec::new();
//! analytics::upsert_goal(&mut goals, GoalType::DailyMinutes, 30, now).unwrap();
//!
//! let windows = GoalWindows::resolve(&now, WeekStart::Monday).unwrap();
//! let progress = analytics::progress_for_all(&goals, &[s], &[], &windows);
//! assert!(progress[0].is_complete());
//! ```

// Re-export commonly used items at the crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Database, SessionFilter};
pub use error::{Error, Result};
pub use session::SessionTimer;
pub use types::*;

// Public modules
pub mod analytics;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod session;
pub mod types;
