//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id               TEXT PRIMARY KEY,
        title            TEXT NOT NULL,
        author           TEXT,
        page_count       INTEGER
    );

    CREATE TABLE IF NOT EXISTS user_books (
        book_id          TEXT PRIMARY KEY REFERENCES books(id) ON DELETE CASCADE,
        status           TEXT NOT NULL,
        current_page     INTEGER,
        started_at       DATETIME,
        completed_at     DATETIME
    );

    CREATE TABLE IF NOT EXISTS reading_sessions (
        id                   TEXT PRIMARY KEY,
        book_id              TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        started_at           DATETIME NOT NULL,
        ended_at             DATETIME,
        paused_at            DATETIME,
        total_paused_seconds INTEGER NOT NULL DEFAULT 0,
        start_page           INTEGER,
        end_page             INTEGER,
        pages_read           INTEGER,
        duration_seconds     INTEGER,
        notes                TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_book ON reading_sessions(book_id, started_at);
    CREATE INDEX IF NOT EXISTS idx_sessions_started ON reading_sessions(started_at);

    CREATE TABLE IF NOT EXISTS reading_goals (
        id               TEXT PRIMARY KEY,
        goal_type        TEXT NOT NULL UNIQUE,
        target_value     INTEGER NOT NULL CHECK (target_value > 0),
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL
    );
    "#,
    // Version 2: At most one active session per book
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active_per_book
        ON reading_sessions(book_id) WHERE ended_at IS NULL;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
