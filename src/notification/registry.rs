use super::store::Notification;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

type Senders = HashMap<u64, mpsc::UnboundedSender<Notification>>;

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    clients: Mutex<HashMap<String, Senders>>,
}

/// Live connections keyed by user id.
///
/// Nothing is buffered for users without an open subscription: a publish to
/// an offline user is dropped.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for a user. Dropping it deregisters.
    pub fn register(&self, user_id: &str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut clients = self.clients();
        let senders = clients.entry(user_id.to_string()).or_default();
        senders.insert(id, tx);
        debug!(user_id, sockets = senders.len(), "Client connected");

        Subscription {
            id,
            user_id: user_id.to_string(),
            rx,
            registry: self.clone(),
        }
    }

    /// Send to every open subscription of the user.
    ///
    /// Returns how many subscriptions received it. Closed ones are pruned.
    pub fn publish(&self, user_id: &str, notification: &Notification) -> usize {
        let mut clients = self.clients();
        let Some(senders) = clients.get_mut(user_id) else {
            return 0;
        };

        senders.retain(|_, tx| tx.send(notification.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            clients.remove(user_id);
        }
        delivered
    }

    /// Number of open subscriptions for a user
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.clients().get(user_id).map_or(0, HashMap::len)
    }

    fn deregister(&self, user_id: &str, id: u64) {
        let mut clients = self.clients();
        if let Some(senders) = clients.get_mut(user_id) {
            senders.remove(&id);
            debug!(user_id, sockets = senders.len(), "Client disconnected");
            if senders.is_empty() {
                clients.remove(user_id);
            }
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, Senders>> {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A live feed of one user's notifications
pub struct Subscription {
    id: u64,
    user_id: String,
    rx: mpsc::UnboundedReceiver<Notification>,
    registry: ConnectionRegistry,
}

impl Subscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.deregister(&self.user_id, self.id);
    }
}
