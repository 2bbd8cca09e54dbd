//! Database layer for quietly
//!
//! SQLite storage for books, shelf status, sessions and goals:
//! - Schema migrations
//! - Repository pattern for queries

pub mod repo;
pub mod schema;

pub use repo::{Database, SessionFilter};
