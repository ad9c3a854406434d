use super::types::{DayItinerary, ItemPatch, ItemType, ItineraryItem, NewItem, TripDay};
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
pub enum ItineraryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Day {0} not found")]
    DayNotFound(String),

    #[error("Item {0} not found")]
    ItemNotFound(String),

    #[error("Location {0} not found")]
    LocationNotFound(String),

    #[error("Day {day_id} does not belong to trip {trip_id}")]
    DayNotInTrip { day_id: String, trip_id: String },

    #[error("Item does not belong to this trip")]
    ItemNotInTrip { item_id: String, trip_id: String },

    #[error("Item name is required")]
    NameRequired,

    #[error("Invalid item type: {0}")]
    InvalidItemType(String),

    #[error("Item end time must not be before its start time")]
    InvalidTimeRange,

    #[error("Cost estimate must not be negative")]
    NegativeCost,
}

/// Result of item deletion
#[derive(Debug, Clone)]
pub struct DeleteItemResult {
    pub item_id: String,
}

const ITEM_COLUMNS: &str = "i.id, i.day_id, i.name, i.item_type, i.description, i.start_time,
     i.end_time, i.cost_estimate, l.id, l.name, l.latitude, l.longitude, l.location_type";

/// Create items on a day.
///
/// All items are inserted in one transaction. An empty list returns an empty
/// list without touching the database.
pub async fn add_items(
    db: &Database,
    day_id: &str,
    items: Vec<NewItem>,
) -> Result<Vec<ItineraryItem>, ItineraryError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    validate_new_items(&items)?;

    let mut conn = db.lock().await;
    if !day_exists(&conn, day_id)? {
        return Err(ItineraryError::DayNotFound(day_id.to_string()));
    }
    insert_items(&mut conn, day_id, items)
}

/// Create items on a day after checking the day belongs to `trip_id`.
pub async fn add_trip_items(
    db: &Database,
    trip_id: &str,
    day_id: &str,
    items: Vec<NewItem>,
) -> Result<Vec<ItineraryItem>, ItineraryError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    validate_new_items(&items)?;

    let mut conn = db.lock().await;
    check_day_in_trip(&conn, day_id, trip_id)?;
    insert_items(&mut conn, day_id, items)
}

/// List a trip's days by day number, each with its items by start time.
///
/// Items without a start time are unscheduled and come after every
/// scheduled item of their day, in creation order.
pub async fn list_days(db: &Database, trip_id: &str) -> Result<Vec<DayItinerary>, ItineraryError> {
    let conn = db.lock().await;
    let days = load_trip_days(&conn, trip_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS}
         FROM itinerary_items i
         JOIN trip_days d ON d.id = i.day_id
         LEFT JOIN locations l ON l.id = i.location_id
         WHERE d.trip_id = ?1
         ORDER BY i.start_time IS NULL, i.start_time ASC, i.rowid ASC"
    ))?;
    let items = stmt
        .query_map([trip_id], row_to_item)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut itinerary: Vec<DayItinerary> = days
        .into_iter()
        .map(|day| DayItinerary {
            day,
            items: Vec::new(),
        })
        .collect();

    for item in items {
        if let Some(entry) = itinerary.iter_mut().find(|d| d.day.id == item.day_id) {
            entry.items.push(item);
        }
    }

    Ok(itinerary)
}

/// Get a single item
pub async fn get_item(db: &Database, item_id: &str) -> Result<ItineraryItem, ItineraryError> {
    let conn = db.lock().await;
    find_item(&conn, item_id)?.ok_or_else(|| ItineraryError::ItemNotFound(item_id.to_string()))
}

/// Apply a partial update to an item
pub async fn update_item(
    db: &Database,
    item_id: &str,
    patch: ItemPatch,
) -> Result<ItineraryItem, ItineraryError> {
    let conn = db.lock().await;
    apply_item_patch(&conn, item_id, patch)
}

/// Update an item after checking it belongs to `trip_id`
pub async fn update_trip_item(
    db: &Database,
    trip_id: &str,
    item_id: &str,
    patch: ItemPatch,
) -> Result<ItineraryItem, ItineraryError> {
    let conn = db.lock().await;
    check_item_in_trip(&conn, item_id, trip_id)?;
    apply_item_patch(&conn, item_id, patch)
}

/// Delete an item
pub async fn delete_item(db: &Database, item_id: &str) -> Result<DeleteItemResult, ItineraryError> {
    let conn = db.lock().await;
    remove_item(&conn, item_id)
}

/// Delete an item after checking it belongs to `trip_id`
pub async fn delete_trip_item(
    db: &Database,
    trip_id: &str,
    item_id: &str,
) -> Result<DeleteItemResult, ItineraryError> {
    let conn = db.lock().await;
    check_item_in_trip(&conn, item_id, trip_id)?;
    remove_item(&conn, item_id)
}

/// Fail unless the item exists and its day belongs to `trip_id`
pub async fn assert_item_belongs_to_trip(
    db: &Database,
    item_id: &str,
    trip_id: &str,
) -> Result<(), ItineraryError> {
    let conn = db.lock().await;
    check_item_in_trip(&conn, item_id, trip_id)
}

/// Load the days of a trip ordered by day number
pub(crate) fn load_trip_days(conn: &Connection, trip_id: &str) -> rusqlite::Result<Vec<TripDay>> {
    let mut stmt = conn.prepare(
        "SELECT id, trip_id, day_number, date
         FROM trip_days
         WHERE trip_id = ?1
         ORDER BY day_number ASC",
    )?;
    let rows = stmt.query_map([trip_id], |row| {
        Ok(TripDay {
            id: row.get(0)?,
            trip_id: row.get(1)?,
            day_number: row.get(2)?,
            date: row.get(3)?,
        })
    })?;
    rows.collect()
}

fn validate_new_items(items: &[NewItem]) -> Result<(), ItineraryError> {
    for item in items {
        validate_fields(
            &item.name,
            item.start_time.as_ref(),
            item.end_time.as_ref(),
            item.cost_estimate,
        )?;
    }
    Ok(())
}

fn validate_fields(
    name: &str,
    start_time: Option<&DateTime<Utc>>,
    end_time: Option<&DateTime<Utc>>,
    cost_estimate: Option<f64>,
) -> Result<(), ItineraryError> {
    if name.trim().is_empty() {
        return Err(ItineraryError::NameRequired);
    }
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if end < start {
            return Err(ItineraryError::InvalidTimeRange);
        }
    }
    if cost_estimate.is_some_and(|c| c < 0.0 || !c.is_finite()) {
        return Err(ItineraryError::NegativeCost);
    }
    Ok(())
}

fn insert_items(
    conn: &mut Connection,
    day_id: &str,
    items: Vec<NewItem>,
) -> Result<Vec<ItineraryItem>, ItineraryError> {
    let tx = conn.transaction()?;
    let now = now_iso();
    let mut ids = Vec::with_capacity(items.len());

    {
        let mut stmt = tx.prepare(
            "INSERT INTO itinerary_items (
                id, day_id, name, item_type, description, start_time, end_time,
                cost_estimate, location_id, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )?;

        for item in items {
            if let Some(location_id) = &item.location_id {
                if !location_exists(&tx, location_id)? {
                    return Err(ItineraryError::LocationNotFound(location_id.clone()));
                }
            }

            let id = generate_id();
            stmt.execute(params![
                id,
                day_id,
                item.name.trim(),
                item.item_type.as_str(),
                item.description,
                item.start_time,
                item.end_time,
                item.cost_estimate,
                item.location_id,
                now
            ])?;
            ids.push(id);
        }
    }

    let mut created = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(item) = find_item(&tx, id)? {
            created.push(item);
        }
    }
    tx.commit()?;

    debug!(day_id = %short_id(day_id), count = created.len(), "Added itinerary items");
    Ok(created)
}

fn apply_item_patch(
    conn: &Connection,
    item_id: &str,
    patch: ItemPatch,
) -> Result<ItineraryItem, ItineraryError> {
    let current =
        find_item(conn, item_id)?.ok_or_else(|| ItineraryError::ItemNotFound(item_id.to_string()))?;

    if patch.is_empty() {
        return Ok(current);
    }

    if let Patch::Set(location_id) = &patch.location_id {
        if !location_exists(conn, location_id)? {
            return Err(ItineraryError::LocationNotFound(location_id.clone()));
        }
    }

    let name = patch.name.unwrap_or(current.name);
    let item_type = patch.item_type.unwrap_or(current.item_type);
    let description = patch.description.apply(current.description);
    let start_time = patch.start_time.apply(current.start_time);
    let end_time = patch.end_time.apply(current.end_time);
    let cost_estimate = patch.cost_estimate.apply(current.cost_estimate);
    let location_id = patch
        .location_id
        .apply(current.location.map(|l| l.id));

    validate_fields(&name, start_time.as_ref(), end_time.as_ref(), cost_estimate)?;

    conn.execute(
        "UPDATE itinerary_items
         SET name = ?2, item_type = ?3, description = ?4, start_time = ?5, end_time = ?6,
             cost_estimate = ?7, location_id = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            item_id,
            name.trim(),
            item_type.as_str(),
            description,
            start_time,
            end_time,
            cost_estimate,
            location_id,
            now_iso()
        ],
    )?;

    find_item(conn, item_id)?.ok_or_else(|| ItineraryError::ItemNotFound(item_id.to_string()))
}

fn remove_item(conn: &Connection, item_id: &str) -> Result<DeleteItemResult, ItineraryError> {
    let deleted = conn.execute("DELETE FROM itinerary_items WHERE id = ?1", [item_id])?;
    if deleted == 0 {
        return Err(ItineraryError::ItemNotFound(item_id.to_string()));
    }
    debug!(item_id = %short_id(item_id), "Deleted itinerary item");
    Ok(DeleteItemResult {
        item_id: item_id.to_string(),
    })
}

fn day_exists(conn: &Connection, day_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM trip_days WHERE id = ?1)",
        [day_id],
        |row| row.get(0),
    )
}

fn check_day_in_trip(conn: &Connection, day_id: &str, trip_id: &str) -> Result<(), ItineraryError> {
    let owner: Option<String> = optional(conn.query_row(
        "SELECT trip_id FROM trip_days WHERE id = ?1",
        [day_id],
        |row| row.get(0),
    ))?;

    match owner {
        None => Err(ItineraryError::DayNotFound(day_id.to_string())),
        Some(owner) if owner != trip_id => Err(ItineraryError::DayNotInTrip {
            day_id: day_id.to_string(),
            trip_id: trip_id.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Join item -> day -> trip and compare with the claimed trip
fn check_item_in_trip(
    conn: &Connection,
    item_id: &str,
    trip_id: &str,
) -> Result<(), ItineraryError> {
    let owner: Option<String> = optional(conn.query_row(
        "SELECT d.trip_id
         FROM itinerary_items i
         JOIN trip_days d ON d.id = i.day_id
         WHERE i.id = ?1",
        [item_id],
        |row| row.get(0),
    ))?;

    match owner {
        None => Err(ItineraryError::ItemNotFound(item_id.to_string())),
        Some(owner) if owner != trip_id => Err(ItineraryError::ItemNotInTrip {
            item_id: item_id.to_string(),
            trip_id: trip_id.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

fn find_item(conn: &Connection, item_id: &str) -> rusqlite::Result<Option<ItineraryItem>> {
    optional(conn.query_row(
        &format!(
            "SELECT {ITEM_COLUMNS}
             FROM itinerary_items i
             LEFT JOIN locations l ON l.id = i.location_id
             WHERE i.id = ?1"
        ),
        [item_id],
        row_to_item,
    ))
}

fn row_to_item(row: &Row) -> rusqlite::Result<ItineraryItem> {
    let item_type: String = row.get(3)?;
    let item_type = ItemType::from_str(&item_type)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
    let location_id: Option<String> = row.get(8)?;

    let location = match location_id {
        Some(id) => Some(Location {
            id,
            name: row.get(9)?,
            latitude: row.get(10)?,
            longitude: row.get(11)?,
            location_type: row.get(12)?,
        }),
        None => None,
    };

    Ok(ItineraryItem {
        id: row.get(0)?,
        day_id: row.get(1)?,
        name: row.get(2)?,
        item_type,
        description: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        cost_estimate: row.get(7)?,
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_fields_time_range() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let result = validate_fields("Museum", Some(&start), Some(&end), None);
        assert!(matches!(result, Err(ItineraryError::InvalidTimeRange)));
        assert!(validate_fields("Museum", Some(&end), Some(&start), None).is_ok());
    }

    #[test]
    fn test_validate_fields_name_and_cost() {
        assert!(matches!(
            validate_fields("  ", None, None, None),
            Err(ItineraryError::NameRequired)
        ));
        assert!(matches!(
            validate_fields("Lunch", None, None, Some(-1.0)),
            Err(ItineraryError::NegativeCost)
        ));
        assert!(validate_fields("Lunch", None, None, Some(0.0)).is_ok());
    }
}
