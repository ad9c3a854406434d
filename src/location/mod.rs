//! Place references attached to itinerary items and accommodations.
//!
//! Locations are created from already-resolved coordinates; geocoding is
//! left to the client.

use crate::db::{optional, Database};
use crate::utils::{generate_id, now_iso};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Maximum number of results returned by a location search
const SEARCH_LIMIT: u32 = 25;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Location {0} not found")]
    LocationNotFound(String),

    #[error("Location name is required")]
    NameRequired,

    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_type: String,
}

/// Options for creating a location
#[derive(Debug, Clone, Default)]
pub struct CreateLocationOptions {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_type: String,
}

/// Create a new location
pub async fn create_location(
    db: &Database,
    options: CreateLocationOptions,
) -> Result<Location, LocationError> {
    let name = options.name.trim();
    if name.is_empty() {
        return Err(LocationError::NameRequired);
    }

    if !(-90.0..=90.0).contains(&options.latitude)
        || !(-180.0..=180.0).contains(&options.longitude)
    {
        return Err(LocationError::InvalidCoordinates {
            latitude: options.latitude,
            longitude: options.longitude,
        });
    }

    let location = Location {
        id: generate_id(),
        name: name.to_string(),
        latitude: options.latitude,
        longitude: options.longitude,
        location_type: options.location_type.trim().to_string(),
    };

    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO locations (id, name, latitude, longitude, location_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            location.id,
            location.name,
            location.latitude,
            location.longitude,
            location.location_type,
            now_iso()
        ],
    )?;

    debug!(location_id = %location.id, name = %location.name, "Created location");
    Ok(location)
}

/// Get a single location by id
pub async fn get_location(db: &Database, location_id: &str) -> Result<Location, LocationError> {
    let conn = db.lock().await;
    find_location(&conn, location_id)?
        .ok_or_else(|| LocationError::LocationNotFound(location_id.to_string()))
}

/// Search locations whose name contains the query (case-insensitive)
pub async fn search_locations(db: &Database, query: &str) -> Result<Vec<Location>, LocationError> {
    let pattern = format!("%{}%", escape_like(query.trim()));
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, name, latitude, longitude, location_type
         FROM locations
         WHERE name LIKE ?1 ESCAPE '\\'
         ORDER BY name ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![pattern, SEARCH_LIMIT], row_to_location)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn find_location(
    conn: &Connection,
    location_id: &str,
) -> rusqlite::Result<Option<Location>> {
    optional(conn.query_row(
        "SELECT id, name, latitude, longitude, location_type FROM locations WHERE id = ?1",
        [location_id],
        row_to_location,
    ))
}

pub(crate) fn location_exists(conn: &Connection, location_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE id = ?1)",
        [location_id],
        |row| row.get(0),
    )
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        location_type: row.get(4)?,
    })
}

/// Escape LIKE wildcards so user input matches literally
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
