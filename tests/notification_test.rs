mod common;

use common::{create_test_db, register_user};
use futures::StreamExt;
use wayfarer_daemon::notification::{
    list_notifications, mark_read, ConnectionRegistry, ListNotificationsOptions,
    NotificationError, Notifier, KIND_FRIEND_REQUEST, KIND_TRIP_INVITE,
};

#[tokio::test]
async fn test_notify_stores_and_fans_out() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;

    let registry = ConnectionRegistry::new();
    let notifier = Notifier::new(db.clone(), registry.clone());
    let mut laptop = registry.register(&alice.id);
    let mut phone = registry.register(&alice.id);
    let mut other = registry.register(&bob.id);

    let sent = notifier
        .notify(
            &alice.id,
            KIND_FRIEND_REQUEST,
            serde_json::json!({ "fromUserId": bob.id }),
        )
        .await
        .expect("Should notify");

    assert_eq!(laptop.next().await.unwrap(), sent);
    assert_eq!(phone.recv().await.unwrap(), sent);

    // Nothing was routed to Bob
    notifier
        .notify(&bob.id, KIND_TRIP_INVITE, serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(other.next().await.unwrap().kind, KIND_TRIP_INVITE);

    let stored = list_notifications(&db, &alice.id, Default::default())
        .await
        .unwrap();
    assert_eq!(stored, vec![sent]);
}

#[tokio::test]
async fn test_offline_user_still_gets_stored_notification() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let notifier = Notifier::new(db.clone(), ConnectionRegistry::new());

    {
        let _closed = notifier.registry().register(&alice.id);
    }
    assert_eq!(notifier.registry().connection_count(&alice.id), 0);

    notifier
        .notify(&alice.id, KIND_TRIP_INVITE, serde_json::json!({ "tripId": "t1" }))
        .await
        .expect("Should store without subscribers");

    let stored = list_notifications(&db, &alice.id, Default::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].payload["tripId"], "t1");
}

#[tokio::test]
async fn test_list_filters_and_mark_read() {
    let db = create_test_db();
    let alice = register_user(&db, "Alice").await;
    let bob = register_user(&db, "Bob").await;
    let notifier = Notifier::new(db.clone(), ConnectionRegistry::new());

    let first = notifier
        .notify(&alice.id, KIND_FRIEND_REQUEST, serde_json::json!({}))
        .await
        .unwrap();
    let second = notifier
        .notify(&alice.id, KIND_TRIP_INVITE, serde_json::json!({}))
        .await
        .unwrap();

    let all = list_notifications(&db, &alice.id, Default::default())
        .await
        .unwrap();
    let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

    let invites = list_notifications(
        &db,
        &alice.id,
        ListNotificationsOptions {
            kind: Some(KIND_TRIP_INVITE.to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(invites, vec![second.clone()]);

    let read = mark_read(&db, &alice.id, &first.id).await.expect("Should mark read");
    assert!(read.read);

    let unread = list_notifications(
        &db,
        &alice.id,
        ListNotificationsOptions {
            read: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, second.id);

    // Another user's notification cannot be touched
    let foreign = mark_read(&db, &bob.id, &second.id).await;
    assert!(matches!(
        foreign,
        Err(NotificationError::NotificationNotFound(_))
    ));
}
