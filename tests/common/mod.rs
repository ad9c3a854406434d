#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use wayfarer_daemon::db::Database;
use wayfarer_daemon::location::{create_location, CreateLocationOptions, Location};
use wayfarer_daemon::trip::{create_trip, CreateTripOptions, Trip};
use wayfarer_daemon::user::{self, friends, SessionKeys, User};

pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Create a fresh in-memory database
pub fn create_test_db() -> Database {
    Database::open_in_memory().expect("Should open in-memory database")
}

pub fn test_keys() -> SessionKeys {
    SessionKeys::new("test-secret", Duration::hours(1))
}

/// Register a user named `name` with a derived email address
pub async fn register_user(db: &Database, name: &str) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    user::register(db, &test_keys(), name, &email, TEST_PASSWORD)
        .await
        .expect("Should register user")
        .user
}

/// Make two users accepted friends
pub async fn make_friends(db: &Database, a: &User, b: &User) {
    friends::send_request(db, &a.id, &b.id)
        .await
        .expect("Should send friend request");
    friends::accept_request(db, &b.id, &a.id)
        .await
        .expect("Should accept friend request");
}

/// A date `days_ahead` days from today, as `YYYY-MM-DD`
pub fn future_date(days_ahead: i64) -> String {
    (Utc::now() + Duration::days(days_ahead))
        .format("%Y-%m-%d")
        .to_string()
}

pub fn parse_date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("Should parse date")
}

/// Create a trip starting `days_ahead` days from now
pub async fn create_test_trip(db: &Database, owner: &User, days_ahead: i64, duration: u32) -> Trip {
    create_trip(
        db,
        &owner.id,
        CreateTripOptions {
            name: format!("Trip in {days_ahead} days"),
            planned_date: future_date(days_ahead),
            planned_duration: duration,
            ..Default::default()
        },
    )
    .await
    .expect("Should create trip")
}

pub async fn create_test_location(db: &Database, name: &str) -> Location {
    create_location(
        db,
        CreateLocationOptions {
            name: name.to_string(),
            latitude: 48.8566,
            longitude: 2.3522,
            location_type: "poi".to_string(),
        },
    )
    .await
    .expect("Should create location")
}

pub async fn count_rows(db: &Database, table: &str) -> i64 {
    let conn = db.lock().await;
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("Should count rows")
}
