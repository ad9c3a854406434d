use super::password::{hash_password, verify_password};
use super::session::{SessionError, SessionKeys};
use crate::db::{is_unique_violation, optional, Database};
use crate::location::escape_like;
use crate::utils::{generate_id, now_iso, short_id};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Maximum number of users returned by an email search
const SEARCH_LIMIT: u32 = 20;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),

    #[error("User not found")]
    UserNotFound(String),

    #[error("User no longer exists")]
    UserGone(String),

    #[error("User already exists with this email")]
    EmailTaken(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Name is required")]
    NameRequired,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Bucket list already contains {0}")]
    PlaceAlreadyListed(String),

    #[error("Place is required")]
    PlaceRequired,

    #[error("Bucket list does not contain {0}")]
    PlaceNotListed(String),
}

/// A registered user. The password hash never leaves this module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A user together with a freshly issued session token
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub token: String,
}

/// Options for updating a user's details. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserOptions {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Create an account and sign the new user in
pub async fn register(
    db: &Database,
    keys: &SessionKeys,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthResult, UserError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::NameRequired);
    }
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(UserError::PasswordRequired);
    }
    let password_hash = hash_password(password)?;

    let now = now_iso();
    let user = User {
        id: generate_id(),
        name: name.to_string(),
        email,
        created_at: now.clone(),
        updated_at: now,
    };

    {
        let conn = db.lock().await;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.name,
                user.email,
                password_hash,
                user.created_at,
                user.updated_at
            ],
        )
        .map_err(|e| map_email_conflict(e, &user.email))?;
    }

    let token = keys.issue_token(&user.id)?;
    info!(user_id = %short_id(&user.id), "Registered user");
    Ok(AuthResult { user, token })
}

/// Check credentials and issue a session token
pub async fn login(
    db: &Database,
    keys: &SessionKeys,
    email: &str,
    password: &str,
) -> Result<AuthResult, UserError> {
    let found = {
        let conn = db.lock().await;
        optional(conn.query_row(
            "SELECT id, name, email, created_at, updated_at, password_hash
             FROM users WHERE email = ?1",
            [email.trim()],
            |row| Ok((row_to_user(row)?, row.get::<_, String>(5)?)),
        ))?
    };

    let (user, password_hash) = found.ok_or(UserError::InvalidCredentials)?;
    if !verify_password(password, &password_hash)? {
        return Err(UserError::InvalidCredentials);
    }

    let token = keys.issue_token(&user.id)?;
    Ok(AuthResult { user, token })
}

/// Resolve a session token to its user.
///
/// A valid token whose user has since been deleted is rejected.
pub async fn authenticate(
    db: &Database,
    keys: &SessionKeys,
    token: &str,
) -> Result<User, UserError> {
    let claims = keys.verify_token(token)?;
    let conn = db.lock().await;
    find_user(&conn, &claims.sub)?.ok_or(UserError::UserGone(claims.sub))
}

pub async fn get_user(db: &Database, user_id: &str) -> Result<User, UserError> {
    let conn = db.lock().await;
    find_user(&conn, user_id)?.ok_or_else(|| UserError::UserNotFound(user_id.to_string()))
}

/// Update name, email or password
pub async fn update_details(
    db: &Database,
    user_id: &str,
    options: UpdateUserOptions,
) -> Result<User, UserError> {
    let name = match options.name {
        Some(name) if name.trim().is_empty() => return Err(UserError::NameRequired),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let email = options.email.as_deref().map(validate_email).transpose()?;
    let password_hash = match options.password.as_deref() {
        Some("") => return Err(UserError::PasswordRequired),
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let conn = db.lock().await;
    let current =
        find_user(&conn, user_id)?.ok_or_else(|| UserError::UserNotFound(user_id.to_string()))?;

    let email = email.unwrap_or(current.email);
    conn.execute(
        "UPDATE users
         SET name = ?2, email = ?3, password_hash = COALESCE(?4, password_hash), updated_at = ?5
         WHERE id = ?1",
        params![
            user_id,
            name.unwrap_or(current.name),
            email,
            password_hash,
            now_iso()
        ],
    )
    .map_err(|e| map_email_conflict(e, &email))?;

    find_user(&conn, user_id)?.ok_or_else(|| UserError::UserNotFound(user_id.to_string()))
}

/// Delete a user and, through cascades, everything they own
pub async fn delete_user(db: &Database, user_id: &str) -> Result<(), UserError> {
    let conn = db.lock().await;
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    if deleted == 0 {
        return Err(UserError::UserNotFound(user_id.to_string()));
    }
    info!(user_id = %short_id(user_id), "Deleted user");
    Ok(())
}

/// Case-insensitive substring search on email, excluding the caller
pub async fn search_users_by_email(
    db: &Database,
    query: &str,
    current_user_id: &str,
) -> Result<Vec<User>, UserError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", escape_like(query));

    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, name, email, created_at, updated_at
         FROM users
         WHERE email LIKE ?1 ESCAPE '\\' AND id != ?2
         ORDER BY email ASC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![pattern, current_user_id, SEARCH_LIMIT], row_to_user)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn find_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<User>> {
    optional(conn.query_row(
        "SELECT id, name, email, created_at, updated_at FROM users WHERE id = ?1",
        [user_id],
        row_to_user,
    ))
}

pub(crate) fn user_exists(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [user_id],
        |row| row.get(0),
    )
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn validate_email(email: &str) -> Result<String, UserError> {
    let email = email.trim();
    if EMAIL_RE.is_match(email) {
        Ok(email.to_string())
    } else {
        Err(UserError::InvalidEmail(email.to_string()))
    }
}

fn map_email_conflict(err: rusqlite::Error, email: &str) -> UserError {
    if is_unique_violation(&err) {
        UserError::EmailTaken(email.to_string())
    } else {
        UserError::DatabaseError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" ana@example.com ").unwrap(),
            "ana@example.com"
        );
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("ana example.com").is_err());
        assert!(validate_email("").is_err());
    }
}
