mod id;
mod patch;

pub use id::{generate_id, short_id};
pub use patch::Patch;

use chrono::{DateTime, NaiveDate, Utc};

/// Name of the database file inside the data directory
pub const DATABASE_FILE: &str = "wayfarer.sqlite";

/// Current schema version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// Longest trip, in days, that can be planned
pub const MAX_TRIP_DURATION_DAYS: u32 = 365;

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp, also accepting a bare `YYYY-MM-DD` date
/// (interpreted as midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
