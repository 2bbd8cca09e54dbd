//! quietly - track reading sessions, streaks and goals from the terminal
//!
//! A thin front end over quietly-core: it loads records from the local
//! database, hands them to the engine, prints the result and stores any
//! session or goal changes.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commands::App;
use quietly_core::{BookStatus, Config, Database, GoalType};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quietly")]
#[command(about = "Quietly - reading sessions, streaks and goals")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage books on the shelf
    Book {
        #[command(subcommand)]
        action: BookAction,
    },

    /// Start a reading session
    Start {
        /// Book ID
        book: String,
        /// Page you are starting on
        #[arg(long)]
        page: Option<i32>,
    },

    /// Pause the active session for a book
    Pause {
        /// Book ID
        book: String,
    },

    /// Resume the paused session for a book
    Resume {
        /// Book ID
        book: String,
    },

    /// End the active session for a book
    End {
        /// Book ID
        book: String,
        /// Page you stopped on
        #[arg(long)]
        page: Option<i32>,
        /// Notes about the session
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show active sessions and their elapsed time
    Status,

    /// Manage reading goals
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Show reading statistics
    Stats {
        /// Limit to a single book
        #[arg(long)]
        book: Option<String>,
    },

    /// Show the current and longest reading streak
    Streak,

    /// Write a widget snapshot (stats, goals, active sessions) as JSON
    Export {
        /// Output path (default: from config, or the data directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum BookAction {
    /// Add a book (or update it if the ID exists)
    Add {
        /// Title
        title: String,
        /// Book ID (generated if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Author
        #[arg(long)]
        author: Option<String>,
        /// Number of pages
        #[arg(long)]
        pages: Option<i32>,
    },

    /// List books with their shelf status
    List,

    /// Set the shelf status of a book (want_to_read, reading, completed)
    Status {
        /// Book ID
        book: String,
        /// New status
        #[arg(value_parser = parse_book_status)]
        status: BookStatus,
    },
}

#[derive(Subcommand, Debug)]
enum GoalAction {
    /// Create a goal or change its target
    Set {
        /// daily_minutes, weekly_minutes, books_per_month or books_per_year
        #[arg(value_parser = parse_goal_type)]
        goal_type: GoalType,
        /// Target (minutes or books)
        target: i32,
    },

    /// Show progress for every goal
    List,

    /// Remove a goal
    Remove {
        #[arg(value_parser = parse_goal_type)]
        goal_type: GoalType,
    },
}

fn parse_goal_type(s: &str) -> std::result::Result<GoalType, String> {
    s.parse()
}

fn parse_book_status(s: &str) -> std::result::Result<BookStatus, String> {
    s.parse()
}

/// Exit status for rejected input or illegal session transitions.
const EXIT_REJECTED: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match run(cli) {
        Err(err) => match err.downcast_ref::<quietly_core::Error>() {
            Some(e) if e.is_validation() => {
                eprintln!("quietly: {}", e);
                std::process::exit(EXIT_REJECTED);
            }
            _ => Err(err),
        },
        ok => ok,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        quietly_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let app = App::new(db, config, cli.format);

    match cli.command {
        Command::Book { action } => match action {
            BookAction::Add {
                title,
                id,
                author,
                pages,
            } => app.add_book(title, id, author, pages),
            BookAction::List => app.list_books(),
            BookAction::Status { book, status } => app.set_book_status(&book, status),
        },
        Command::Start { book, page } => app.start(&book, page),
        Command::Pause { book } => app.pause(&book),
        Command::Resume { book } => app.resume(&book),
        Command::End { book, page, notes } => app.end(&book, page, notes),
        Command::Status => app.status(),
        Command::Goal { action } => match action {
            GoalAction::Set { goal_type, target } => app.set_goal(goal_type, target),
            GoalAction::List => app.list_goals(),
            GoalAction::Remove { goal_type } => app.remove_goal(goal_type),
        },
        Command::Stats { book } => match book {
            Some(book) => app.book_stats(&book),
            None => app.stats(),
        },
        Command::Streak => app.streak(),
        Command::Export { out } => app.export(out),
    }
}
