mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{
    count_rows, create_test_db, create_test_location, create_test_trip, register_user,
};
use wayfarer_daemon::db::Database;
use wayfarer_daemon::itinerary::{
    add_items, add_trip_items, delete_trip_item, get_item, list_days, update_item,
    update_trip_item, ItemPatch, ItemType, ItineraryError, NewItem, TripDay,
};
use wayfarer_daemon::reconciliation::reconcile_trip_days;
use wayfarer_daemon::utils::Patch;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 6, 1, hour, 0, 0).unwrap()
}

fn item(name: &str, start: Option<DateTime<Utc>>) -> NewItem {
    NewItem {
        name: name.to_string(),
        start_time: start,
        ..Default::default()
    }
}

/// Two trips, each with reconciled days
async fn two_trips(db: &Database) -> (String, Vec<TripDay>, String, Vec<TripDay>) {
    let owner = register_user(db, "Alice").await;
    let first = create_test_trip(db, &owner, 10, 2).await;
    let second = create_test_trip(db, &owner, 30, 2).await;
    let first_days = reconcile_trip_days(db, &first.id).await.unwrap().days;
    let second_days = reconcile_trip_days(db, &second.id).await.unwrap().days;
    (first.id, first_days, second.id, second_days)
}

#[tokio::test]
async fn test_add_items_and_list_in_time_order() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;

    let created = add_trip_items(
        &db,
        &trip_id,
        &days[0].id,
        vec![
            item("Free afternoon", None),
            item("Dinner", Some(at(19))),
            item("Museum", Some(at(10))),
            item("Souvenirs", None),
        ],
    )
    .await
    .expect("Should add items");
    assert_eq!(created.len(), 4);

    let listed = list_days(&db, &trip_id).await.expect("Should list days");
    assert_eq!(listed.len(), 2);
    let names: Vec<&str> = listed[0].items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Museum", "Dinner", "Free afternoon", "Souvenirs"]);
    assert!(listed[1].items.is_empty());
}

#[tokio::test]
async fn test_add_items_is_all_or_nothing() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;

    let result = add_trip_items(
        &db,
        &trip_id,
        &days[0].id,
        vec![
            item("Valid", None),
            NewItem {
                name: "Lost".to_string(),
                location_id: Some("missing-location".to_string()),
                ..Default::default()
            },
        ],
    )
    .await;

    assert!(matches!(result, Err(ItineraryError::LocationNotFound(_))));
    assert_eq!(count_rows(&db, "itinerary_items").await, 0);
}

#[tokio::test]
async fn test_add_items_validation() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;

    let blank = add_trip_items(&db, &trip_id, &days[0].id, vec![item("  ", None)]).await;
    assert!(matches!(blank, Err(ItineraryError::NameRequired)));

    let backwards = add_trip_items(
        &db,
        &trip_id,
        &days[0].id,
        vec![NewItem {
            name: "Backwards".to_string(),
            start_time: Some(at(12)),
            end_time: Some(at(9)),
            ..Default::default()
        }],
    )
    .await;
    assert!(matches!(backwards, Err(ItineraryError::InvalidTimeRange)));

    let unknown_day = add_items(&db, "no-such-day", vec![item("Walk", None)]).await;
    assert!(matches!(unknown_day, Err(ItineraryError::DayNotFound(_))));

    let empty = add_items(&db, "no-such-day", vec![]).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_add_items_to_day_of_other_trip_fails() {
    let db = create_test_db();
    let (trip_id, _, _, other_days) = two_trips(&db).await;

    let result = add_trip_items(&db, &trip_id, &other_days[0].id, vec![item("Walk", None)]).await;
    assert!(matches!(result, Err(ItineraryError::DayNotInTrip { .. })));
    assert_eq!(count_rows(&db, "itinerary_items").await, 0);
}

#[tokio::test]
async fn test_cross_trip_update_and_delete_leave_item_untouched() {
    let db = create_test_db();
    let (trip_id, days, other_trip_id, _) = two_trips(&db).await;
    let created = add_trip_items(&db, &trip_id, &days[0].id, vec![item("Museum", Some(at(10)))])
        .await
        .unwrap();
    let item_id = created[0].id.clone();

    let update = update_trip_item(
        &db,
        &other_trip_id,
        &item_id,
        ItemPatch {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        },
    )
    .await;
    match update {
        Err(e @ ItineraryError::ItemNotInTrip { .. }) => {
            assert_eq!(e.to_string(), "Item does not belong to this trip");
        }
        other => panic!("Expected ItemNotInTrip, got {:?}", other),
    }

    let delete = delete_trip_item(&db, &other_trip_id, &item_id).await;
    assert!(matches!(delete, Err(ItineraryError::ItemNotInTrip { .. })));

    let stored = get_item(&db, &item_id).await.expect("Item should still exist");
    assert_eq!(stored, created[0]);
}

#[tokio::test]
async fn test_update_item_patch_semantics() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;
    let location = create_test_location(&db, "Louvre").await;

    let created = add_trip_items(
        &db,
        &trip_id,
        &days[0].id,
        vec![NewItem {
            name: "Museum".to_string(),
            item_type: ItemType::Sightseeing,
            description: Some("Bring tickets".to_string()),
            start_time: Some(at(10)),
            cost_estimate: Some(17.0),
            location_id: Some(location.id.clone()),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    assert_eq!(created[0].location.as_ref(), Some(&location));

    // Unchanged fields survive, cleared fields become None
    let updated = update_trip_item(
        &db,
        &trip_id,
        &created[0].id,
        ItemPatch {
            name: Some("Louvre visit".to_string()),
            location_id: Patch::Clear,
            cost_estimate: Patch::Clear,
            ..Default::default()
        },
    )
    .await
    .expect("Should update item");

    assert_eq!(updated.name, "Louvre visit");
    assert_eq!(updated.item_type, ItemType::Sightseeing);
    assert_eq!(updated.description.as_deref(), Some("Bring tickets"));
    assert_eq!(updated.start_time, Some(at(10)));
    assert_eq!(updated.cost_estimate, None);
    assert_eq!(updated.location, None);

    let unscheduled = update_item(
        &db,
        &created[0].id,
        ItemPatch {
            start_time: Patch::Clear,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(unscheduled.start_time, None);
    assert_eq!(unscheduled.name, "Louvre visit");
}

#[tokio::test]
async fn test_update_rejects_end_before_existing_start() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;
    let created = add_trip_items(&db, &trip_id, &days[0].id, vec![item("Museum", Some(at(10)))])
        .await
        .unwrap();

    let result = update_trip_item(
        &db,
        &trip_id,
        &created[0].id,
        ItemPatch {
            end_time: Patch::Set(at(8)),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(ItineraryError::InvalidTimeRange)));
}

#[tokio::test]
async fn test_delete_item() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;
    let created = add_trip_items(&db, &trip_id, &days[1].id, vec![item("Hike", None)])
        .await
        .unwrap();

    let result = delete_trip_item(&db, &trip_id, &created[0].id)
        .await
        .expect("Should delete item");
    assert_eq!(result.item_id, created[0].id);

    match get_item(&db, &created[0].id).await {
        Err(e @ ItineraryError::ItemNotFound(_)) => {
            assert_eq!(e.to_string(), format!("Item {} not found", created[0].id));
        }
        other => panic!("Expected ItemNotFound, got {:?}", other),
    }

    let again = delete_trip_item(&db, &trip_id, &created[0].id).await;
    assert!(matches!(again, Err(ItineraryError::ItemNotFound(_))));
}

#[tokio::test]
async fn test_unknown_stored_item_type_is_an_error() {
    let db = create_test_db();
    let (trip_id, days, _, _) = two_trips(&db).await;
    let created = add_trip_items(&db, &trip_id, &days[0].id, vec![item("Ferry", None)])
        .await
        .unwrap();

    {
        let conn = db.lock().await;
        conn.execute(
            "UPDATE itinerary_items SET item_type = 'TELEPORT' WHERE id = ?1",
            [&created[0].id],
        )
        .unwrap();
    }

    let result = get_item(&db, &created[0].id).await;
    assert!(matches!(
        result,
        Err(ItineraryError::DatabaseError(
            rusqlite::Error::FromSqlConversionFailure(3, _, _)
        ))
    ));
}
