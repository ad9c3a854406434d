//! Row identifiers.
//!
//! Every table keys its rows by a UUID v4 string so ids can be generated
//! without a round trip to the database.

use uuid::Uuid;

/// Generate a new row id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the short form of an id (first 8 characters), for log lines
pub fn short_id(id: &str) -> &str {
    if id.len() >= 8 && id.is_char_boundary(8) {
        &id[..8]
    } else {
        id
    }
}
