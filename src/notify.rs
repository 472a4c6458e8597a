//! Fan-out of task change notifications to live listeners.
//!
//! Every listener owns a private bounded queue. [`NotificationHub::broadcast`] pushes into
//! each queue with `try_send` and never waits: a full queue drops the event for that
//! listener, a closed queue unregisters it. Delivery is at-most-once per listener.
//!
//! A [`Subscription`] interleaves real events with heartbeats on a fixed schedule that
//! is set up when the subscription is created and is never reset by event traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Interval, MissedTickBehavior};

use crate::types::{Notification, NotificationKind};

type ListenerId = u64;

/// Registry of listener queues
pub struct NotificationHub {
    listeners: Arc<Mutex<HashMap<ListenerId, mpsc::Sender<Notification>>>>,
    next_id: AtomicU64,
    buffer: usize,
    keep_alive: Duration,
}

impl NotificationHub {
    /// Create a hub whose listeners hold at most `buffer` undelivered events and receive a
    /// heartbeat every `keep_alive`
    pub fn new(buffer: usize, keep_alive: Duration) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            keep_alive,
        }
    }

    /// Register a new listener. Its first event is `connected`.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);

        // Fresh queue with capacity >= 1, cannot fail
        let _ = tx.try_send(Notification::now(NotificationKind::Connected));

        match self.listeners.lock() {
            Ok(mut listeners) => {
                listeners.insert(id, tx);
                tracing::debug!(listener_id = id, listeners = listeners.len(), "Listener subscribed");
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, tx);
            }
        }

        let start = tokio::time::Instant::now() + self.keep_alive;
        let mut heartbeat = tokio::time::interval_at(start, self.keep_alive);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Subscription {
            id,
            rx,
            heartbeat,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Push a notification of `kind` to every listener without waiting.
    ///
    /// Returns how many listeners accepted it.
    pub fn broadcast(&self, kind: NotificationKind) -> usize {
        let notification = Notification::now(kind);

        // Clone the senders out so no send happens under the registry lock
        let targets: Vec<(ListenerId, mpsc::Sender<Notification>)> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect(),
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(notification) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(listener_id = id, "Listener queue full, dropping notification");
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            self.unregister(&closed);
        }
        delivered
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        match self.listeners.lock() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn unregister(&self, ids: &[ListenerId]) {
        remove_listeners(&self.listeners, ids);
    }
}

fn remove_listeners(
    listeners: &Mutex<HashMap<ListenerId, mpsc::Sender<Notification>>>,
    ids: &[ListenerId],
) {
    let mut listeners = match listeners.lock() {
        Ok(listeners) => listeners,
        Err(poisoned) => poisoned.into_inner(),
    };
    for id in ids {
        if listeners.remove(id).is_some() {
            tracing::debug!(listener_id = id, "Listener unregistered");
        }
    }
}

/// One listener's view of the hub. Dropping it unregisters the listener.
pub struct Subscription {
    id: ListenerId,
    rx: mpsc::Receiver<Notification>,
    heartbeat: Interval,
    listeners: Weak<Mutex<HashMap<ListenerId, mpsc::Sender<Notification>>>>,
}

impl Subscription {
    /// Wait for the next event or heartbeat.
    ///
    /// Returns `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        // Heartbeat first: a queued backlog must not delay it
        tokio::select! {
            biased;
            _ = self.heartbeat.tick() => Some(Notification::now(NotificationKind::Heartbeat)),
            received = self.rx.recv() => received,
        }
    }

    /// Turn the subscription into a stream of notifications
    pub fn into_stream(self) -> impl futures::Stream<Item = Notification> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|notification| (notification, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            remove_listeners(&listeners, &[self.id]);
        }
    }
}
