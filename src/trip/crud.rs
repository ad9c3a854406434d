use super::types::{CreateTripOptions, MemberRole, Trip, TripMember, UpdateTripOptions};
use crate::db::{optional, Database};
use crate::user::friends::non_friends;
use crate::utils::{
    generate_id, now_iso, parse_timestamp, short_id, Patch, MAX_TRIP_DURATION_DAYS,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TripError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Trip not found")]
    TripNotFound(String),

    #[error("Only the trip owner can do this")]
    NotOwner(String),

    #[error("You do not have access to this trip")]
    NotMember(String),

    #[error("Viewers cannot modify this trip")]
    ReadOnly(String),

    #[error("Trip name is required")]
    NameRequired,

    #[error("Please provide a valid date.")]
    InvalidDate(String),

    #[error("The planned date must be in the future.")]
    DateInPast,

    #[error("The duration must be between 1 and {} days.", MAX_TRIP_DURATION_DAYS)]
    InvalidDuration,

    #[error("Budget must not be negative")]
    NegativeBudget,

    #[error("You already have a trip planned for this date.")]
    DateTaken,

    #[error("These users are not your friends: {}", .0.join(", "))]
    NotFriends(Vec<String>),
}

/// Result of trip deletion
#[derive(Debug, Clone)]
pub struct DeleteTripResult {
    pub trip_id: String,
}

/// Create a trip owned by `owner_id`.
///
/// The owner becomes an `OWNER` member and every id in `member_ids` a
/// `VIEWER`; those ids must be accepted friends of the owner.
pub async fn create_trip(
    db: &Database,
    owner_id: &str,
    options: CreateTripOptions,
) -> Result<Trip, TripError> {
    let name = options.name.trim().to_string();
    if name.is_empty() {
        return Err(TripError::NameRequired);
    }
    let planned_date = validate_future_date(&options.planned_date)?;
    validate_duration(options.planned_duration)?;
    validate_budget(options.budget)?;

    let mut member_ids: Vec<String> = Vec::new();
    for id in options.member_ids {
        if id != owner_id && !member_ids.contains(&id) {
            member_ids.push(id);
        }
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;

    ensure_date_free(&tx, owner_id, &planned_date, None)?;
    let strangers = non_friends(&tx, owner_id, &member_ids)?;
    if !strangers.is_empty() {
        return Err(TripError::NotFriends(strangers));
    }

    let trip_id = generate_id();
    let now = now_iso();
    tx.execute(
        "INSERT INTO trips (
            id, owner_id, name, planned_date, planned_duration, budget, preferences,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            trip_id,
            owner_id,
            name,
            planned_date,
            options.planned_duration,
            options.budget,
            serde_json::to_string(&clean_preferences(options.preferences))?,
            now
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO trip_members (trip_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![trip_id, owner_id, MemberRole::Owner.as_str(), now])?;
        for member_id in &member_ids {
            stmt.execute(params![trip_id, member_id, MemberRole::Viewer.as_str(), now])?;
        }
    }

    let trip = load_trip(&tx, &trip_id)?.ok_or_else(|| TripError::TripNotFound(trip_id.clone()))?;
    tx.commit()?;

    info!(
        trip_id = %short_id(&trip.id),
        owner_id = %short_id(owner_id),
        members = member_ids.len(),
        "Created trip"
    );
    Ok(trip)
}

/// Get a trip visible to `user_id`
pub async fn get_trip(db: &Database, user_id: &str, trip_id: &str) -> Result<Trip, TripError> {
    let conn = db.lock().await;
    member_role(&conn, user_id, trip_id)?;
    load_trip(&conn, trip_id)?.ok_or_else(|| TripError::TripNotFound(trip_id.to_string()))
}

/// Trips the user owns or is a member of, by planned date
pub async fn list_trips(db: &Database, user_id: &str) -> Result<Vec<Trip>, TripError> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT t.id
         FROM trips t
         WHERE t.owner_id = ?1
            OR EXISTS (SELECT 1 FROM trip_members m WHERE m.trip_id = t.id AND m.user_id = ?1)
         ORDER BY t.planned_date IS NULL, t.planned_date ASC, t.created_at ASC",
    )?;
    let ids = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut trips = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(trip) = load_trip(&conn, &id)? {
            trips.push(trip);
        }
    }
    Ok(trips)
}

/// Update name, plan, budget or preferences.
///
/// Stored days are not touched; reconcile the trip afterwards to bring them
/// in line with a changed plan.
pub async fn update_basics(
    db: &Database,
    trip_id: &str,
    user_id: &str,
    options: UpdateTripOptions,
) -> Result<Trip, TripError> {
    let name = match options.name {
        Some(name) if name.trim().is_empty() => return Err(TripError::NameRequired),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let planned_date = options
        .planned_date
        .as_deref()
        .map(validate_future_date)
        .transpose()?;
    if let Some(duration) = options.planned_duration {
        validate_duration(duration)?;
    }
    if let Patch::Set(budget) = options.budget {
        validate_budget(Some(budget))?;
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;
    check_owner(&tx, user_id, trip_id)?;

    let current =
        load_trip(&tx, trip_id)?.ok_or_else(|| TripError::TripNotFound(trip_id.to_string()))?;

    if let Some(date) = &planned_date {
        ensure_date_free(&tx, &current.owner_id, date, Some(trip_id))?;
    }

    let preferences = match options.preferences {
        Some(preferences) => clean_preferences(preferences),
        None => current.preferences,
    };

    tx.execute(
        "UPDATE trips
         SET name = ?2, planned_date = ?3, planned_duration = ?4, budget = ?5,
             preferences = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            trip_id,
            name.unwrap_or(current.name),
            planned_date.or(current.planned_date),
            options.planned_duration.or(current.planned_duration),
            options.budget.apply(current.budget),
            serde_json::to_string(&preferences)?,
            now_iso()
        ],
    )?;

    let trip = load_trip(&tx, trip_id)?.ok_or_else(|| TripError::TripNotFound(trip_id.to_string()))?;
    tx.commit()?;

    info!(trip_id = %short_id(trip_id), "Updated trip basics");
    Ok(trip)
}

/// Delete a trip with its days, items, accommodations and members
pub async fn delete_trip(
    db: &Database,
    user_id: &str,
    trip_id: &str,
) -> Result<DeleteTripResult, TripError> {
    let conn = db.lock().await;
    check_owner(&conn, user_id, trip_id)?;
    conn.execute("DELETE FROM trips WHERE id = ?1", [trip_id])?;

    info!(trip_id = %short_id(trip_id), "Deleted trip");
    Ok(DeleteTripResult {
        trip_id: trip_id.to_string(),
    })
}

/// Fail with `TripNotFound` if the trip is absent, `NotOwner` if the user
/// does not own it.
pub async fn assert_user_is_trip_owner(
    db: &Database,
    user_id: &str,
    trip_id: &str,
) -> Result<(), TripError> {
    let conn = db.lock().await;
    check_owner(&conn, user_id, trip_id)
}

/// Fail unless the user is the owner or a member of the trip
pub async fn assert_user_can_view_trip(
    db: &Database,
    user_id: &str,
    trip_id: &str,
) -> Result<MemberRole, TripError> {
    let conn = db.lock().await;
    member_role(&conn, user_id, trip_id)
}

/// Fail unless the user is the owner or an editor of the trip
pub async fn assert_user_can_edit_trip(
    db: &Database,
    user_id: &str,
    trip_id: &str,
) -> Result<MemberRole, TripError> {
    let conn = db.lock().await;
    let role = member_role(&conn, user_id, trip_id)?;
    if !role.can_edit() {
        return Err(TripError::ReadOnly(trip_id.to_string()));
    }
    Ok(role)
}

pub(crate) fn check_owner(conn: &Connection, user_id: &str, trip_id: &str) -> Result<(), TripError> {
    let owner_id: Option<String> = optional(conn.query_row(
        "SELECT owner_id FROM trips WHERE id = ?1",
        [trip_id],
        |row| row.get(0),
    ))?;

    match owner_id {
        None => Err(TripError::TripNotFound(trip_id.to_string())),
        Some(owner_id) if owner_id != user_id => Err(TripError::NotOwner(trip_id.to_string())),
        Some(_) => Ok(()),
    }
}

fn member_role(conn: &Connection, user_id: &str, trip_id: &str) -> Result<MemberRole, TripError> {
    let row: Option<(String, Option<String>)> = optional(conn.query_row(
        "SELECT t.owner_id, m.role
         FROM trips t
         LEFT JOIN trip_members m ON m.trip_id = t.id AND m.user_id = ?2
         WHERE t.id = ?1",
        params![trip_id, user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ))?;

    match row {
        None => Err(TripError::TripNotFound(trip_id.to_string())),
        Some((owner_id, _)) if owner_id == user_id => Ok(MemberRole::Owner),
        Some((_, Some(role))) => MemberRole::from_str(&role)
            .map_err(|_| TripError::NotMember(trip_id.to_string())),
        Some((_, None)) => Err(TripError::NotMember(trip_id.to_string())),
    }
}

/// Load a trip with its members
pub(crate) fn load_trip(conn: &Connection, trip_id: &str) -> Result<Option<Trip>, TripError> {
    let row = optional(conn.query_row(
        "SELECT id, owner_id, name, planned_date, planned_duration, budget, preferences,
                created_at, updated_at
         FROM trips WHERE id = ?1",
        [trip_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<DateTime<Utc>>>(3)?,
                row.get::<_, Option<u32>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        },
    ))?;

    let Some((id, owner_id, name, planned_date, planned_duration, budget, prefs, created, updated)) =
        row
    else {
        return Ok(None);
    };

    Ok(Some(Trip {
        members: load_members(conn, &id)?,
        id,
        owner_id,
        name,
        planned_date,
        planned_duration,
        budget,
        preferences: serde_json::from_str(&prefs)?,
        created_at: created,
        updated_at: updated,
    }))
}

pub(crate) fn load_members(conn: &Connection, trip_id: &str) -> rusqlite::Result<Vec<TripMember>> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, u.name, m.role, m.joined_at
         FROM trip_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.trip_id = ?1
         ORDER BY m.role = 'OWNER' DESC, m.joined_at ASC, m.rowid ASC",
    )?;
    let rows = stmt.query_map([trip_id], |row| {
        let role: String = row.get(2)?;
        Ok(TripMember {
            user_id: row.get(0)?,
            name: row.get(1)?,
            role: MemberRole::from_str(&role).unwrap_or(MemberRole::Viewer),
            joined_at: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Parse a planned date and require it to lie in the future
fn validate_future_date(value: &str) -> Result<DateTime<Utc>, TripError> {
    let date = parse_timestamp(value).ok_or_else(|| TripError::InvalidDate(value.to_string()))?;
    if date < Utc::now() {
        return Err(TripError::DateInPast);
    }
    Ok(date)
}

fn validate_duration(duration: u32) -> Result<(), TripError> {
    if duration == 0 || duration > MAX_TRIP_DURATION_DAYS {
        return Err(TripError::InvalidDuration);
    }
    Ok(())
}

fn validate_budget(budget: Option<f64>) -> Result<(), TripError> {
    if budget.is_some_and(|b| b < 0.0 || !b.is_finite()) {
        return Err(TripError::NegativeBudget);
    }
    Ok(())
}

/// An owner may not have two trips starting on the same calendar day
fn ensure_date_free(
    conn: &Connection,
    owner_id: &str,
    date: &DateTime<Utc>,
    exclude_trip_id: Option<&str>,
) -> Result<(), TripError> {
    let mut stmt = conn.prepare(
        "SELECT id, planned_date FROM trips WHERE owner_id = ?1 AND planned_date IS NOT NULL",
    )?;
    let rows = stmt.query_map([owner_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, DateTime<Utc>>(1)?))
    })?;

    let day = date.date_naive();
    for row in rows {
        let (id, other) = row?;
        if Some(id.as_str()) != exclude_trip_id && other.date_naive() == day {
            return Err(TripError::DateTaken);
        }
    }
    Ok(())
}

fn clean_preferences(preferences: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(preferences.len());
    for pref in preferences {
        let pref = pref.trim();
        if !pref.is_empty() && !cleaned.iter().any(|p| p == pref) {
            cleaned.push(pref.to_string());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_future_date() {
        assert!(matches!(
            validate_future_date("2001-01-01"),
            Err(TripError::DateInPast)
        ));
        assert!(matches!(
            validate_future_date("someday"),
            Err(TripError::InvalidDate(_))
        ));
        assert!(validate_future_date("2999-01-01T09:00:00Z").is_ok());
    }

    #[test]
    fn test_clean_preferences() {
        let cleaned = clean_preferences(vec![
            " beach ".to_string(),
            "".to_string(),
            "beach".to_string(),
            "museums".to_string(),
        ]);
        assert_eq!(cleaned, vec!["beach".to_string(), "museums".to_string()]);
    }
}
