use super::crud::{check_owner, load_members, TripError};
use super::types::{MemberRole, TripMember};
use crate::db::{optional, Database};
use crate::user::friends::non_friends;
use crate::utils::{now_iso, short_id};
use rusqlite::params;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MemberError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    TripError(#[from] TripError),

    #[error("Member not found")]
    MemberNotFound(String),

    #[error("No new members to add")]
    NoMembers,

    #[error("These users are already members of the trip: {}", .0.join(", "))]
    AlreadyMembers(Vec<String>),

    #[error("These users are not your friends: {}", .0.join(", "))]
    NotFriends(Vec<String>),

    #[error("Cannot remove the owner")]
    CannotRemoveOwner,

    #[error("Cannot change the owner role")]
    CannotChangeOwnerRole,

    #[error("Invalid role. Must be one of: VIEWER, EDITOR")]
    InvalidRole(String),
}

/// Add accepted friends of the owner to a trip as viewers.
///
/// Returns only the newly added members.
pub async fn add_members(
    db: &Database,
    trip_id: &str,
    owner_id: &str,
    member_ids: Vec<String>,
) -> Result<Vec<TripMember>, MemberError> {
    let mut ids: Vec<String> = Vec::new();
    for id in member_ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(MemberError::NoMembers);
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;
    check_owner(&tx, owner_id, trip_id)?;

    let existing = load_members(&tx, trip_id)?;
    let duplicates: Vec<String> = ids
        .iter()
        .filter(|id| existing.iter().any(|m| &m.user_id == *id))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(MemberError::AlreadyMembers(duplicates));
    }

    let strangers = non_friends(&tx, owner_id, &ids)?;
    if !strangers.is_empty() {
        return Err(MemberError::NotFriends(strangers));
    }

    let now = now_iso();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO trip_members (trip_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for id in &ids {
            stmt.execute(params![trip_id, id, MemberRole::Viewer.as_str(), now])?;
        }
    }

    let added: Vec<TripMember> = load_members(&tx, trip_id)?
        .into_iter()
        .filter(|m| ids.contains(&m.user_id))
        .collect();
    tx.commit()?;

    info!(trip_id = %short_id(trip_id), count = added.len(), "Added trip members");
    Ok(added)
}

/// Remove a member. The owner cannot be removed.
pub async fn remove_member(
    db: &Database,
    owner_id: &str,
    trip_id: &str,
    member_id: &str,
) -> Result<(), MemberError> {
    let conn = db.lock().await;
    check_owner(&conn, owner_id, trip_id)?;

    match find_role(&conn, trip_id, member_id)? {
        None => return Err(MemberError::MemberNotFound(member_id.to_string())),
        Some(MemberRole::Owner) => return Err(MemberError::CannotRemoveOwner),
        Some(_) => {}
    }

    conn.execute(
        "DELETE FROM trip_members WHERE trip_id = ?1 AND user_id = ?2",
        params![trip_id, member_id],
    )?;

    info!(trip_id = %short_id(trip_id), member_id = %short_id(member_id), "Removed trip member");
    Ok(())
}

/// Change a member's role between `VIEWER` and `EDITOR`
pub async fn update_member_role(
    db: &Database,
    trip_id: &str,
    owner_id: &str,
    member_id: &str,
    role: &str,
) -> Result<TripMember, MemberError> {
    let role = match MemberRole::from_str(role) {
        Ok(role @ (MemberRole::Viewer | MemberRole::Editor)) => role,
        _ => return Err(MemberError::InvalidRole(role.to_string())),
    };

    let conn = db.lock().await;
    check_owner(&conn, owner_id, trip_id)?;

    match find_role(&conn, trip_id, member_id)? {
        None => return Err(MemberError::MemberNotFound(member_id.to_string())),
        Some(MemberRole::Owner) => return Err(MemberError::CannotChangeOwnerRole),
        Some(_) => {}
    }

    conn.execute(
        "UPDATE trip_members SET role = ?3 WHERE trip_id = ?1 AND user_id = ?2",
        params![trip_id, member_id, role.as_str()],
    )?;

    load_members(&conn, trip_id)?
        .into_iter()
        .find(|m| m.user_id == member_id)
        .ok_or_else(|| MemberError::MemberNotFound(member_id.to_string()))
}

fn find_role(
    conn: &rusqlite::Connection,
    trip_id: &str,
    member_id: &str,
) -> rusqlite::Result<Option<MemberRole>> {
    let role: Option<String> = optional(conn.query_row(
        "SELECT role FROM trip_members WHERE trip_id = ?1 AND user_id = ?2",
        params![trip_id, member_id],
        |row| row.get(0),
    ))?;
    Ok(role.and_then(|r| MemberRole::from_str(&r).ok()))
}
