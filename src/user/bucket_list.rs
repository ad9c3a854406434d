use super::account::{user_exists, UserError};
use crate::db::{is_unique_violation, Database};
use crate::utils::now_iso;
use rusqlite::{params, Connection};

/// Add a place to a user's bucket list. Returns the place as stored.
pub async fn add(db: &Database, user_id: &str, place: &str) -> Result<String, UserError> {
    let place = place.trim();
    if place.is_empty() {
        return Err(UserError::PlaceRequired);
    }

    let conn = db.lock().await;
    if !user_exists(&conn, user_id)? {
        return Err(UserError::UserNotFound(user_id.to_string()));
    }

    conn.execute(
        "INSERT INTO bucket_list_entries (user_id, place, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, place, now_iso()],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            UserError::PlaceAlreadyListed(place.to_string())
        } else {
            UserError::DatabaseError(e)
        }
    })?;

    Ok(place.to_string())
}

/// Places in the order they were added
pub async fn list(db: &Database, user_id: &str) -> Result<Vec<String>, UserError> {
    let conn = db.lock().await;
    if !user_exists(&conn, user_id)? {
        return Err(UserError::UserNotFound(user_id.to_string()));
    }
    Ok(load_places(&conn, user_id)?)
}

/// Remove a place and return what is left
pub async fn remove(db: &Database, user_id: &str, place: &str) -> Result<Vec<String>, UserError> {
    let place = place.trim();
    if place.is_empty() {
        return Err(UserError::PlaceRequired);
    }

    let conn = db.lock().await;
    let removed = conn.execute(
        "DELETE FROM bucket_list_entries WHERE user_id = ?1 AND place = ?2",
        params![user_id, place],
    )?;
    if removed == 0 {
        return Err(UserError::PlaceNotListed(place.to_string()));
    }
    Ok(load_places(&conn, user_id)?)
}

fn load_places(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT place FROM bucket_list_entries WHERE user_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    rows.collect()
}
