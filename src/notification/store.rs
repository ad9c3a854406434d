use super::registry::ConnectionRegistry;
use crate::db::Database;
use crate::utils::{generate_id, now_iso, short_id};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Kind used when someone sends the user a friend request
pub const KIND_FRIEND_REQUEST: &str = "FRIEND_REQUEST";
/// Kind used when a friend request the user sent is accepted
pub const KIND_FRIEND_ACCEPTED: &str = "FRIEND_ACCEPTED";
/// Kind used when the user is added to a trip
pub const KIND_TRIP_INVITE: &str = "TRIP_INVITE";

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Notification not found")]
    NotificationNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub read: bool,
    pub created_at: String,
}

/// Filters for listing notifications. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListNotificationsOptions {
    pub kind: Option<String>,
    pub read: Option<bool>,
}

/// Writes notifications and pushes them to connected clients
#[derive(Clone)]
pub struct Notifier {
    db: Database,
    registry: ConnectionRegistry,
}

impl Notifier {
    pub fn new(db: Database, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Store a notification, then publish it to the user's open subscriptions
    pub async fn notify(
        &self,
        user_id: &str,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification {
            id: generate_id(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            payload,
            read: false,
            created_at: now_iso(),
        };

        {
            let conn = self.db.lock().await;
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, payload, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    notification.id,
                    notification.user_id,
                    notification.kind,
                    serde_json::to_string(&notification.payload)?,
                    notification.created_at
                ],
            )?;
        }

        let delivered = self.registry.publish(user_id, &notification);
        debug!(user_id = %short_id(user_id), kind, delivered, "Sent notification");
        Ok(notification)
    }
}

/// A user's notifications, newest first
pub async fn list_notifications(
    db: &Database,
    user_id: &str,
    options: ListNotificationsOptions,
) -> Result<Vec<Notification>, NotificationError> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, payload, read, created_at
         FROM notifications
         WHERE user_id = ?1
           AND (?2 IS NULL OR kind = ?2)
           AND (?3 IS NULL OR read = ?3)
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![user_id, options.kind, options.read], row_to_raw)?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row?.parse()?);
    }
    Ok(notifications)
}

/// Mark one of the user's notifications as read
pub async fn mark_read(
    db: &Database,
    user_id: &str,
    notification_id: &str,
) -> Result<Notification, NotificationError> {
    let conn = db.lock().await;
    let updated = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )?;
    if updated == 0 {
        return Err(NotificationError::NotificationNotFound(
            notification_id.to_string(),
        ));
    }

    let raw = conn.query_row(
        "SELECT id, user_id, kind, payload, read, created_at FROM notifications WHERE id = ?1",
        [notification_id],
        row_to_raw,
    )?;
    raw.parse()
}

/// A row whose payload has not been parsed yet
struct RawNotification {
    id: String,
    user_id: String,
    kind: String,
    payload: String,
    read: bool,
    created_at: String,
}

impl RawNotification {
    fn parse(self) -> Result<Notification, NotificationError> {
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            payload: serde_json::from_str(&self.payload)?,
            read: self.read,
            created_at: self.created_at,
        })
    }
}

fn row_to_raw(row: &Row) -> rusqlite::Result<RawNotification> {
    Ok(RawNotification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        payload: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}
