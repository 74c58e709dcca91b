//! Entity-scoped query operations, implemented as methods on [`Database`].
//!
//! Reads return `Option` or an empty `Vec` for missing rows; writes against
//! a missing id fail. Every write commits before returning.
//!
//! [`Database`]: crate::Database

mod conversations;
mod messages;
mod users;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Render optional LIMIT/OFFSET into a SQL suffix. SQLite only accepts an
/// OFFSET clause after a LIMIT, so a missing limit becomes `LIMIT -1`.
fn limit_offset(limit: Option<u32>, offset: Option<u32>) -> String {
    match (limit, offset) {
        (None, None) => String::new(),
        (limit, offset) => format!(
            " LIMIT {} OFFSET {}",
            limit.map_or(-1, i64::from),
            offset.unwrap_or(0)
        ),
    }
}

/// Timestamps are stored as RFC 3339 text.
fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json(idx: usize, raw: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
