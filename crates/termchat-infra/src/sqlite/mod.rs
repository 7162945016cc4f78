//! SQLite storage for TermChat.
//!
//! - `pool`: split reader/writer pool in WAL mode, runs migrations
//! - `user`: `UserDirectory` implementation
//! - `message`: `MessageStore` implementation with sealed bodies

pub mod message;
pub mod pool;
pub mod user;

use chrono::{DateTime, Utc};

/// SQLite reports every unique-index violation with this prefix.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE") => {
            Some(db_err.message().to_string())
        }
        _ => None,
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
