//! Snapshot export for widgets and lock-screen activities.
//!
//! The engine produces an immutable [`WidgetSnapshot`]; whatever shared-state
//! mechanism a platform owns (an app-group file, a widget timeline, a push
//! payload) receives it through a [`SnapshotSink`]. Data flows one way only.

use crate::analytics::{GoalProgress, ReadingStats};
use crate::error::Result;
use crate::session::elapsed_seconds;
use crate::types::{GoalType, ReadingSession, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Countup payload for one active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSessionSnapshot {
    pub session_id: String,
    pub book_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_paused_seconds: i64,
    /// Net reading time at `generated_at`
    pub elapsed_seconds: i64,
}

impl ActiveSessionSnapshot {
    pub fn capture(session: &ReadingSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.clone(),
            book_id: session.book_id.clone(),
            state: session.state(),
            started_at: session.started_at,
            paused_at: session.paused_at,
            total_paused_seconds: session.total_paused_seconds,
            elapsed_seconds: elapsed_seconds(session, now),
        }
    }
}

/// Flattened goal progress, with the derived fields materialized for consumers
/// that cannot call back into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSnapshot {
    pub goal_type: GoalType,
    pub current_value: i64,
    pub target_value: i64,
    pub progress: f64,
    pub progress_percentage: u32,
    pub is_complete: bool,
}

impl From<&GoalProgress> for GoalSnapshot {
    fn from(p: &GoalProgress) -> Self {
        Self {
            goal_type: p.goal.goal_type,
            current_value: p.current_value,
            target_value: p.target_value,
            progress: p.progress(),
            progress_percentage: p.progress_percentage(),
            is_complete: p.is_complete(),
        }
    }
}

/// Everything a widget needs, computed at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    pub generated_at: DateTime<Utc>,
    pub stats: ReadingStats,
    pub goals: Vec<GoalSnapshot>,
    pub active_sessions: Vec<ActiveSessionSnapshot>,
}

impl WidgetSnapshot {
    /// Assemble a snapshot. Ended sessions in `sessions` are skipped.
    pub fn build(
        now: DateTime<Utc>,
        stats: ReadingStats,
        goals: &[GoalProgress],
        sessions: &[ReadingSession],
    ) -> Self {
        Self {
            generated_at: now,
            stats,
            goals: goals.iter().map(GoalSnapshot::from).collect(),
            active_sessions: sessions
                .iter()
                .filter(|s| s.is_active())
                .map(|s| ActiveSessionSnapshot::capture(s, now))
                .collect(),
        }
    }
}

/// Destination for snapshots.
pub trait SnapshotSink {
    fn publish(&self, snapshot: &WidgetSnapshot) -> Result<()>;
}

/// Writes each snapshot as pretty-printed JSON, replacing the previous one.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    fn publish(&self, snapshot: &WidgetSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write then rename so readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Snapshot published");
        Ok(())
    }
}
