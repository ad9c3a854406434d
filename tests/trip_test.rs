mod common;

use common::{create_test_db, create_test_trip, future_date, make_friends, register_user};
use wayfarer_daemon::trip::{
    add_members, assert_user_can_edit_trip, assert_user_can_view_trip, assert_user_is_trip_owner,
    create_trip, delete_trip, get_trip, list_trips, remove_member, update_basics,
    update_member_role, CreateTripOptions, MemberError, MemberRole, TripError, UpdateTripOptions,
};
use wayfarer_daemon::utils::{Patch, MAX_TRIP_DURATION_DAYS};

#[tokio::test]
async fn test_create_trip_with_friends_as_viewers() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    make_friends(&db, &alice, &bob).await;

    let trip = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            name: "  Lisbon  ".to_string(),
            planned_date: future_date(14),
            planned_duration: 3,
            budget: Some(1500.0),
            preferences: vec!["food".to_string(), " ".to_string(), "food".to_string()],
            member_ids: vec![bob.id.clone()],
        },
    )
    .await
    .expect("Should create trip");

    assert_eq!(trip.name, "Lisbon");
    assert_eq!(trip.owner_id, alice.id);
    assert_eq!(trip.planned_duration, Some(3));
    assert_eq!(trip.budget, Some(1500.0));
    assert_eq!(trip.preferences, vec!["food".to_string()]);

    let owner = trip.members.iter().find(|m| m.user_id == alice.id).unwrap();
    assert_eq!(owner.role, MemberRole::Owner);
    let viewer = trip.members.iter().find(|m| m.user_id == bob.id).unwrap();
    assert_eq!(viewer.role, MemberRole::Viewer);

    let seen_by_bob = get_trip(&db, &bob.id, &trip.id).await.expect("Bob can view");
    assert_eq!(seen_by_bob.id, trip.id);
    assert_eq!(list_trips(&db, &bob.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_trip_validation() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let stranger = register_user(&db, "Mallory").await;

    let base = CreateTripOptions {
        name: "Trip".to_string(),
        planned_date: future_date(5),
        planned_duration: 2,
        ..Default::default()
    };

    let past = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            planned_date: future_date(-3),
            ..base.clone()
        },
    )
    .await;
    assert!(matches!(past, Err(TripError::DateInPast)));

    let garbage = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            planned_date: "next tuesday".to_string(),
            ..base.clone()
        },
    )
    .await;
    assert!(matches!(garbage, Err(TripError::InvalidDate(_))));

    let zero = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            planned_duration: 0,
            ..base.clone()
        },
    )
    .await;
    assert!(matches!(zero, Err(TripError::InvalidDuration)));

    let too_long = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            planned_duration: MAX_TRIP_DURATION_DAYS + 1,
            ..base.clone()
        },
    )
    .await;
    match too_long {
        Err(e @ TripError::InvalidDuration) => {
            assert_eq!(e.to_string(), "The duration must be between 1 and 365 days.");
        }
        other => panic!("Expected InvalidDuration, got {:?}", other),
    }

    let strangers = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            member_ids: vec![stranger.id.clone()],
            ..base.clone()
        },
    )
    .await;
    assert!(matches!(strangers, Err(TripError::NotFriends(ids)) if ids == vec![stranger.id.clone()]));

    assert!(list_trips(&db, &alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_trip_per_owner_and_day() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    create_test_trip(&db, &alice, 20, 2).await;

    let clash = create_trip(
        &db,
        &alice.id,
        CreateTripOptions {
            name: "Second".to_string(),
            planned_date: future_date(20),
            planned_duration: 1,
            ..Default::default()
        },
    )
    .await;
    match clash {
        Err(e @ TripError::DateTaken) => {
            assert_eq!(e.to_string(), "You already have a trip planned for this date.");
        }
        other => panic!("Expected DateTaken, got {:?}", other),
    }

    // Another owner may plan the same day
    create_test_trip(&db, &bob, 20, 2).await;
}

#[tokio::test]
async fn test_update_basics_is_owner_only() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    let trip = create_test_trip(&db, &alice, 20, 2).await;

    let denied = update_basics(
        &db,
        &trip.id,
        &bob.id,
        UpdateTripOptions {
            name: Some("Mine now".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(denied, Err(TripError::NotOwner(_))));

    let too_long = update_basics(
        &db,
        &trip.id,
        &alice.id,
        UpdateTripOptions {
            planned_duration: Some(u32::MAX),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(too_long, Err(TripError::InvalidDuration)));

    let updated = update_basics(
        &db,
        &trip.id,
        &alice.id,
        UpdateTripOptions {
            name: Some("Renamed".to_string()),
            budget: Patch::Set(300.0),
            preferences: Some(vec!["museums".to_string()]),
            ..Default::default()
        },
    )
    .await
    .expect("Should update trip");
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.budget, Some(300.0));
    assert_eq!(updated.preferences, vec!["museums".to_string()]);
    assert_eq!(updated.planned_duration, Some(2));

    let cleared = update_basics(
        &db,
        &trip.id,
        &alice.id,
        UpdateTripOptions {
            budget: Patch::Clear,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(cleared.budget, None);
    assert_eq!(cleared.name, "Renamed");
}

#[tokio::test]
async fn test_authorization_checks() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    let carol = register_user(&db, "Carol").await;
    make_friends(&db, &alice, &bob).await;
    let trip = create_test_trip(&db, &alice, 20, 2).await;
    add_members(&db, &trip.id, &alice.id, vec![bob.id.clone()])
        .await
        .expect("Should add member");

    assert!(assert_user_is_trip_owner(&db, &alice.id, &trip.id).await.is_ok());
    assert!(matches!(
        assert_user_is_trip_owner(&db, &bob.id, &trip.id).await,
        Err(TripError::NotOwner(_))
    ));
    assert!(matches!(
        assert_user_is_trip_owner(&db, &alice.id, "missing").await,
        Err(TripError::TripNotFound(_))
    ));

    assert_eq!(
        assert_user_can_view_trip(&db, &bob.id, &trip.id).await.unwrap(),
        MemberRole::Viewer
    );
    assert!(matches!(
        assert_user_can_edit_trip(&db, &bob.id, &trip.id).await,
        Err(TripError::ReadOnly(_))
    ));
    assert!(matches!(
        assert_user_can_view_trip(&db, &carol.id, &trip.id).await,
        Err(TripError::NotMember(_))
    ));

    update_member_role(&db, &trip.id, &alice.id, &bob.id, "editor")
        .await
        .expect("Should promote member");
    assert_eq!(
        assert_user_can_edit_trip(&db, &bob.id, &trip.id).await.unwrap(),
        MemberRole::Editor
    );
}

#[tokio::test]
async fn test_member_management() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    let carol = register_user(&db, "Carol").await;
    make_friends(&db, &alice, &bob).await;
    let trip = create_test_trip(&db, &alice, 20, 2).await;

    let stranger = add_members(&db, &trip.id, &alice.id, vec![carol.id.clone()]).await;
    assert!(matches!(stranger, Err(MemberError::NotFriends(_))));

    let added = add_members(&db, &trip.id, &alice.id, vec![bob.id.clone(), bob.id.clone()])
        .await
        .unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].role, MemberRole::Viewer);

    let duplicate = add_members(&db, &trip.id, &alice.id, vec![bob.id.clone()]).await;
    assert!(matches!(duplicate, Err(MemberError::AlreadyMembers(_))));

    let not_owner = add_members(&db, &trip.id, &bob.id, vec![alice.id.clone()]).await;
    assert!(matches!(
        not_owner,
        Err(MemberError::TripError(TripError::NotOwner(_)))
    ));

    let bad_role = update_member_role(&db, &trip.id, &alice.id, &bob.id, "OWNER").await;
    assert!(matches!(bad_role, Err(MemberError::InvalidRole(_))));

    let remove_owner = remove_member(&db, &alice.id, &trip.id, &alice.id).await;
    assert!(matches!(remove_owner, Err(MemberError::CannotRemoveOwner)));

    remove_member(&db, &alice.id, &trip.id, &bob.id)
        .await
        .expect("Should remove member");
    assert!(matches!(
        get_trip(&db, &bob.id, &trip.id).await,
        Err(TripError::NotMember(_))
    ));
}

#[tokio::test]
async fn test_delete_trip_cascades() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    let trip = create_test_trip(&db, &alice, 20, 2).await;
    wayfarer_daemon::reconciliation::reconcile_trip_days(&db, &trip.id)
        .await
        .unwrap();

    let denied = delete_trip(&db, &bob.id, &trip.id).await;
    assert!(matches!(denied, Err(TripError::NotOwner(_))));

    delete_trip(&db, &alice.id, &trip.id)
        .await
        .expect("Should delete trip");
    assert!(list_trips(&db, &alice.id).await.unwrap().is_empty());
    assert_eq!(common::count_rows(&db, "trip_days").await, 0);
    assert_eq!(common::count_rows(&db, "trip_members").await, 0);
}
