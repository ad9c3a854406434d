//! Friend requests.
//!
//! Every edge is stored as two mirrored rows, `(user, friend)` and
//! `(friend, user)`, carrying the same status and requester. Both rows are
//! always written in the same transaction.

use super::account::{find_user, user_exists, User};
use crate::db::{optional, Database};
use crate::utils::{now_iso, short_id};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FriendError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("You cannot send a friend request to yourself")]
    SelfRequest,

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("A friendship with this user already exists ({0})")]
    AlreadyConnected(FriendshipStatus),

    #[error("No pending friend request from this user")]
    RequestNotFound,

    #[error("Only the recipient can accept a friend request")]
    NotRecipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Blocked,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "PENDING",
            FriendshipStatus::Accepted => "ACCEPTED",
            FriendshipStatus::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendshipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FriendshipStatus::Pending),
            "ACCEPTED" => Ok(FriendshipStatus::Accepted),
            "BLOCKED" => Ok(FriendshipStatus::Blocked),
            _ => Err(s.to_string()),
        }
    }
}

/// One direction of a friendship edge, as seen from `user_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendshipStatus,
    pub requested_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Send a friend request from `user_id` to `friend_id`
pub async fn send_request(
    db: &Database,
    user_id: &str,
    friend_id: &str,
) -> Result<Friendship, FriendError> {
    if user_id == friend_id {
        return Err(FriendError::SelfRequest);
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;

    if !user_exists(&tx, friend_id)? {
        return Err(FriendError::UserNotFound(friend_id.to_string()));
    }
    if let Some(existing) = find_edge(&tx, user_id, friend_id)? {
        return Err(FriendError::AlreadyConnected(existing.status));
    }

    let now = now_iso();
    let mut stmt = tx.prepare(
        "INSERT INTO friendships (user_id, friend_id, status, requested_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )?;
    let pending = FriendshipStatus::Pending.as_str();
    stmt.execute(params![user_id, friend_id, pending, user_id, now])?;
    stmt.execute(params![friend_id, user_id, pending, user_id, now])?;
    drop(stmt);

    let friendship = find_edge(&tx, user_id, friend_id)?.ok_or(FriendError::RequestNotFound)?;
    tx.commit()?;

    debug!(
        user_id = %short_id(user_id),
        friend_id = %short_id(friend_id),
        "Sent friend request"
    );
    Ok(friendship)
}

/// Accept the pending request `friend_id` sent to `user_id`
pub async fn accept_request(
    db: &Database,
    user_id: &str,
    friend_id: &str,
) -> Result<Friendship, FriendError> {
    let mut conn = db.lock().await;
    let tx = conn.transaction()?;

    let edge = find_edge(&tx, user_id, friend_id)?.ok_or(FriendError::RequestNotFound)?;
    if edge.status != FriendshipStatus::Pending {
        return Err(FriendError::RequestNotFound);
    }
    if edge.requested_by != friend_id {
        return Err(FriendError::NotRecipient);
    }

    set_status(&tx, user_id, friend_id, FriendshipStatus::Accepted)?;
    let friendship = find_edge(&tx, user_id, friend_id)?.ok_or(FriendError::RequestNotFound)?;
    tx.commit()?;

    debug!(
        user_id = %short_id(user_id),
        friend_id = %short_id(friend_id),
        "Accepted friend request"
    );
    Ok(friendship)
}

/// Block `friend_id`, creating the edge if there was none
pub async fn block(
    db: &Database,
    user_id: &str,
    friend_id: &str,
) -> Result<Friendship, FriendError> {
    if user_id == friend_id {
        return Err(FriendError::SelfRequest);
    }

    let mut conn = db.lock().await;
    let tx = conn.transaction()?;

    if !user_exists(&tx, friend_id)? {
        return Err(FriendError::UserNotFound(friend_id.to_string()));
    }

    let now = now_iso();
    let mut stmt = tx.prepare(
        "INSERT INTO friendships (user_id, friend_id, status, requested_by, created_at, updated_at)
         VALUES (?1, ?2, 'BLOCKED', ?3, ?4, ?4)
         ON CONFLICT (user_id, friend_id) DO UPDATE
         SET status = 'BLOCKED', requested_by = excluded.requested_by,
             updated_at = excluded.updated_at",
    )?;
    stmt.execute(params![user_id, friend_id, user_id, now])?;
    stmt.execute(params![friend_id, user_id, user_id, now])?;
    drop(stmt);

    let friendship = find_edge(&tx, user_id, friend_id)?.ok_or(FriendError::RequestNotFound)?;
    tx.commit()?;
    Ok(friendship)
}

/// Accepted friends of a user, by name
pub async fn list_friends(db: &Database, user_id: &str) -> Result<Vec<User>, FriendError> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT f.friend_id
         FROM friendships f
         JOIN users u ON u.id = f.friend_id
         WHERE f.user_id = ?1 AND f.status = 'ACCEPTED'
         ORDER BY u.name ASC",
    )?;
    let ids = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut friends = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = find_user(&conn, &id)? {
            friends.push(user);
        }
    }
    Ok(friends)
}

/// Whether every id in `ids` is an accepted friend of `user_id`
pub async fn are_friends(db: &Database, user_id: &str, ids: &[String]) -> Result<bool, FriendError> {
    let conn = db.lock().await;
    Ok(non_friends(&conn, user_id, ids)?.is_empty())
}

/// Ids from `ids` that are not accepted friends of `user_id`
pub(crate) fn non_friends(
    conn: &Connection,
    user_id: &str,
    ids: &[String],
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1 FROM friendships
            WHERE user_id = ?1 AND friend_id = ?2 AND status = 'ACCEPTED'
         )",
    )?;
    let mut missing = Vec::new();
    for id in ids {
        let is_friend: bool = stmt.query_row(params![user_id, id], |row| row.get(0))?;
        if !is_friend {
            missing.push(id.clone());
        }
    }
    Ok(missing)
}

fn set_status(
    conn: &Connection,
    user_id: &str,
    friend_id: &str,
    status: FriendshipStatus,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE friendships SET status = ?3, updated_at = ?4
         WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
        params![user_id, friend_id, status.as_str(), now_iso()],
    )
}

fn find_edge(
    conn: &Connection,
    user_id: &str,
    friend_id: &str,
) -> rusqlite::Result<Option<Friendship>> {
    optional(conn.query_row(
        "SELECT user_id, friend_id, status, requested_by, created_at, updated_at
         FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
        params![user_id, friend_id],
        row_to_friendship,
    ))
}

fn row_to_friendship(row: &Row) -> rusqlite::Result<Friendship> {
    let status: String = row.get(2)?;
    let status = FriendshipStatus::from_str(&status).map_err(|value| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown friendship status {value}").into(),
        )
    })?;

    Ok(Friendship {
        user_id: row.get(0)?,
        friend_id: row.get(1)?,
        status,
        requested_by: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
