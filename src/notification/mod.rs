//! Notifications: one database row per notification, pushed live to every
//! open subscription of the recipient.

mod registry;
mod store;

pub use registry::{ConnectionRegistry, Subscription};
pub use store::{
    list_notifications, mark_read, ListNotificationsOptions, Notification, NotificationError,
    Notifier, KIND_FRIEND_ACCEPTED, KIND_FRIEND_REQUEST, KIND_TRIP_INVITE,
};
