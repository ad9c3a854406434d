use super::types::{Accommodation, AccommodationPatch, AccommodationType, NewAccommodation};
use crate::db::{optional, Database};
use crate::location::{location_exists, Location};
use crate::utils::{generate_id, now_iso, short_id, Patch};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AccommodationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Trip {0} not found")]
    TripNotFound(String),

    #[error("Accommodation {0} not found")]
    AccommodationNotFound(String),

    #[error("Location {0} not found")]
    LocationNotFound(String),

    #[error("Accommodation does not belong to this trip")]
    NotInTrip {
        accommodation_id: String,
        trip_id: String,
    },

    #[error("Accommodation name is required")]
    NameRequired,

    #[error("Check-out must not be before check-in")]
    InvalidStayRange,

    #[error("Cost must not be negative")]
    NegativeCost,
}

/// Result of accommodation deletion
#[derive(Debug, Clone)]
pub struct DeleteAccommodationResult {
    pub accommodation_id: String,
}

const ACCOMMODATION_COLUMNS: &str =
    "a.id, a.trip_id, a.name, a.accommodation_type, a.check_in, a.check_out, a.cost,
     l.id, l.name, l.latitude, l.longitude, l.location_type";

/// Create accommodations for a trip in one transaction
pub async fn add_accommodations(
    db: &Database,
    trip_id: &str,
    accommodations: Vec<NewAccommodation>,
) -> Result<Vec<Accommodation>, AccommodationError> {
    if accommodations.is_empty() {
        return Ok(Vec::new());
    }
    for acc in &accommodations {
        validate_fields(&acc.name, &acc.check_in, &acc.check_out, acc.cost)?;
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;

    let trip_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM trips WHERE id = ?1)",
        [trip_id],
        |row| row.get(0),
    )?;
    if !trip_exists {
        return Err(AccommodationError::TripNotFound(trip_id.to_string()));
    }

    let now = now_iso();
    let mut ids = Vec::with_capacity(accommodations.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO accommodations (
                id, trip_id, name, accommodation_type, check_in, check_out, cost,
                location_id, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        )?;
        for acc in accommodations {
            if !location_exists(&tx, &acc.location_id)? {
                return Err(AccommodationError::LocationNotFound(acc.location_id));
            }
            let id = generate_id();
            stmt.execute(params![
                id,
                trip_id,
                acc.name.trim(),
                acc.accommodation_type.as_str(),
                acc.check_in,
                acc.check_out,
                acc.cost,
                acc.location_id,
                now
            ])?;
            ids.push(id);
        }
    }

    let mut created = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(acc) = find_accommodation(&tx, id)? {
            created.push(acc);
        }
    }
    tx.commit()?;

    debug!(trip_id = %short_id(trip_id), count = created.len(), "Added accommodations");
    Ok(created)
}

/// List a trip's accommodations by check-in
pub async fn list_accommodations(
    db: &Database,
    trip_id: &str,
) -> Result<Vec<Accommodation>, AccommodationError> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOMMODATION_COLUMNS}
         FROM accommodations a
         LEFT JOIN locations l ON l.id = a.location_id
         WHERE a.trip_id = ?1
         ORDER BY a.check_in ASC, a.rowid ASC"
    ))?;
    let rows = stmt.query_map([trip_id], row_to_accommodation)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Apply a partial update after checking the accommodation belongs to the trip
pub async fn update_accommodation(
    db: &Database,
    accommodation_id: &str,
    trip_id: &str,
    patch: AccommodationPatch,
) -> Result<Accommodation, AccommodationError> {
    let conn = db.lock().await;
    check_in_trip(&conn, accommodation_id, trip_id)?;

    let current = find_accommodation(&conn, accommodation_id)?
        .ok_or_else(|| AccommodationError::AccommodationNotFound(accommodation_id.to_string()))?;
    if patch.is_empty() {
        return Ok(current);
    }

    if let Patch::Set(location_id) = &patch.location_id {
        if !location_exists(&conn, location_id)? {
            return Err(AccommodationError::LocationNotFound(location_id.clone()));
        }
    }

    let name = patch.name.unwrap_or(current.name);
    let accommodation_type = patch
        .accommodation_type
        .unwrap_or(current.accommodation_type);
    let check_in = patch.check_in.unwrap_or(current.check_in);
    let check_out = patch.check_out.unwrap_or(current.check_out);
    let cost = patch.cost.apply(current.cost);
    let location_id = patch.location_id.apply(current.location.map(|l| l.id));

    validate_fields(&name, &check_in, &check_out, cost)?;

    conn.execute(
        "UPDATE accommodations
         SET name = ?2, accommodation_type = ?3, check_in = ?4, check_out = ?5, cost = ?6,
             location_id = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            accommodation_id,
            name.trim(),
            accommodation_type.as_str(),
            check_in,
            check_out,
            cost,
            location_id,
            now_iso()
        ],
    )?;

    find_accommodation(&conn, accommodation_id)?
        .ok_or_else(|| AccommodationError::AccommodationNotFound(accommodation_id.to_string()))
}

/// Delete an accommodation after checking it belongs to the trip
pub async fn delete_accommodation(
    db: &Database,
    accommodation_id: &str,
    trip_id: &str,
) -> Result<DeleteAccommodationResult, AccommodationError> {
    let conn = db.lock().await;
    check_in_trip(&conn, accommodation_id, trip_id)?;
    conn.execute(
        "DELETE FROM accommodations WHERE id = ?1",
        [accommodation_id],
    )?;

    debug!(accommodation_id = %short_id(accommodation_id), "Deleted accommodation");
    Ok(DeleteAccommodationResult {
        accommodation_id: accommodation_id.to_string(),
    })
}

/// Fail unless the accommodation exists and belongs to `trip_id`
pub async fn assert_accommodation_belongs_to_trip(
    db: &Database,
    accommodation_id: &str,
    trip_id: &str,
) -> Result<(), AccommodationError> {
    let conn = db.lock().await;
    check_in_trip(&conn, accommodation_id, trip_id)
}

fn check_in_trip(
    conn: &Connection,
    accommodation_id: &str,
    trip_id: &str,
) -> Result<(), AccommodationError> {
    let owner: Option<String> = optional(conn.query_row(
        "SELECT trip_id FROM accommodations WHERE id = ?1",
        [accommodation_id],
        |row| row.get(0),
    ))?;

    match owner {
        None => Err(AccommodationError::AccommodationNotFound(
            accommodation_id.to_string(),
        )),
        Some(owner) if owner != trip_id => Err(AccommodationError::NotInTrip {
            accommodation_id: accommodation_id.to_string(),
            trip_id: trip_id.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

fn validate_fields(
    name: &str,
    check_in: &DateTime<Utc>,
    check_out: &DateTime<Utc>,
    cost: Option<f64>,
) -> Result<(), AccommodationError> {
    if name.trim().is_empty() {
        return Err(AccommodationError::NameRequired);
    }
    if check_out < check_in {
        return Err(AccommodationError::InvalidStayRange);
    }
    if cost.is_some_and(|c| c < 0.0 || !c.is_finite()) {
        return Err(AccommodationError::NegativeCost);
    }
    Ok(())
}

fn find_accommodation(
    conn: &Connection,
    accommodation_id: &str,
) -> rusqlite::Result<Option<Accommodation>> {
    optional(conn.query_row(
        &format!(
            "SELECT {ACCOMMODATION_COLUMNS}
             FROM accommodations a
             LEFT JOIN locations l ON l.id = a.location_id
             WHERE a.id = ?1"
        ),
        [accommodation_id],
        row_to_accommodation,
    ))
}

fn row_to_accommodation(row: &Row) -> rusqlite::Result<Accommodation> {
    let accommodation_type: String = row.get(3)?;
    let accommodation_type = AccommodationType::from_str(&accommodation_type)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
    let location_id: Option<String> = row.get(7)?;

    let location = match location_id {
        Some(id) => Some(Location {
            id,
            name: row.get(8)?,
            latitude: row.get(9)?,
            longitude: row.get(10)?,
            location_type: row.get(11)?,
        }),
        None => None,
    };

    Ok(Accommodation {
        id: row.get(0)?,
        trip_id: row.get(1)?,
        name: row.get(2)?,
        accommodation_type,
        check_in: row.get(4)?,
        check_out: row.get(5)?,
        cost: row.get(6)?,
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_stay_range() {
        let check_in = Utc.with_ymd_and_hms(2030, 3, 1, 15, 0, 0).unwrap();
        let check_out = Utc.with_ymd_and_hms(2030, 3, 4, 11, 0, 0).unwrap();
        assert!(validate_fields("Inn", &check_in, &check_out, Some(120.0)).is_ok());
        assert!(matches!(
            validate_fields("Inn", &check_out, &check_in, None),
            Err(AccommodationError::InvalidStayRange)
        ));
        assert!(matches!(
            validate_fields("", &check_in, &check_out, None),
            Err(AccommodationError::NameRequired)
        ));
    }

    #[test]
    fn test_accommodation_type_fallback() {
        assert_eq!(
            AccommodationType::from_str("hostel"),
            Ok(AccommodationType::Hostel)
        );
        assert_eq!(
            AccommodationType::from_str("treehouse").unwrap_or_default(),
            AccommodationType::Other
        );
    }
}
