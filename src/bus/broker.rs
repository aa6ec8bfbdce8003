// src/bus/broker.rs

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{Message, Topic};

/// Capacity of each per-topic channel. A subscriber that falls further
/// behind than this loses its oldest messages instead of blocking publishers.
const CHANNEL_CAPACITY: usize = 64;

/// Process-wide publish/subscribe bus.
///
/// Cloning is cheap; all clones publish into the same channels. Every topic
/// has its own broadcast channel, created up front, so a subscriber only
/// ever sees messages published after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    topics: [broadcast::Sender<Message>; 4],
    all: broadcast::Sender<Message>,
}

impl EventBus {
    pub fn new() -> Self {
        let topics = std::array::from_fn(|_| broadcast::channel(CHANNEL_CAPACITY).0);
        let (all, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner { topics, all }),
        }
    }

    /// Publish without waiting. Having no subscribers is not an error.
    pub fn publish(&self, message: Message) {
        let topic = message.topic();
        debug!(%topic, "publishing bus event");
        let _ = self.inner.all.send(message.clone());
        let _ = self.inner.topics[topic.index()].send(message);
    }

    /// Subscribe to future messages on a single topic.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            label: topic.as_str(),
            rx: self.inner.topics[topic.index()].subscribe(),
        }
    }

    /// Subscribe to future messages on every topic.
    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            label: "*",
            rx: self.inner.all.subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner.topics[topic.index()].receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

/// Receiving end of a bus subscription.
pub struct Subscription {
    label: &'static str,
    rx: broadcast::Receiver<Message>,
}

impl Subscription {
    /// Wait for the next message. Returns `None` once the bus is gone.
    ///
    /// Messages dropped because this subscriber lagged are skipped with a
    /// warning.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = self.label, skipped, "bus subscriber lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(topic = self.label, skipped, "bus subscriber lagged; messages dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.label)
            .finish_non_exhaustive()
    }
}
