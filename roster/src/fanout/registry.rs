use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::auth::Claims;
use crate::metrics::{ROSTER_FANOUT_FRAMES_DROPPED_TOTAL, ROSTER_FANOUT_SUBSCRIBERS};
use crate::types::{NotificationPayload, PushFrame};

pub type SubscriberId = u64;

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::Sender<Arc<str>>,
    claims: Claims,
}

#[derive(Debug)]
struct Inner {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Registry of open push subscribers.
///
/// Each subscriber owns a bounded frame buffer drained by its connection task. Broadcasting
/// never waits: a frame is dropped for a subscriber whose buffer is full, and a subscriber
/// whose connection is gone is removed.
#[derive(Debug, Clone)]
pub struct FanoutChannel {
    inner: Arc<Inner>,
}

impl FanoutChannel {
    /// Creates an empty registry buffering up to `buffer` frames per subscriber.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Adds an authenticated subscriber and returns the receiving end of its frame buffer.
    pub fn register(&self, claims: Claims) -> (SubscriberId, mpsc::Receiver<Arc<str>>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        let count = {
            let mut subscribers = self.inner.subscribers.write();
            debug!(subscriber_id = id, username = %claims.username, "subscriber registered");
            subscribers.insert(id, Subscriber { tx, claims });
            subscribers.len()
        };
        gauge!(ROSTER_FANOUT_SUBSCRIBERS).set(count as f64);

        (id, rx)
    }

    /// Removes a subscriber, returning whether it was registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.inner.subscribers.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            debug!(subscriber_id = id, "subscriber removed");
            gauge!(ROSTER_FANOUT_SUBSCRIBERS).set(count as f64);
        }

        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Broadcasts a notification frame to every subscriber and returns how many accepted it.
    ///
    /// Publishing with no subscribers does nothing.
    pub fn publish(&self, payload: &NotificationPayload) -> usize {
        if self.subscriber_count() == 0 {
            return 0;
        }

        let frame = PushFrame::Notification {
            data: payload.clone(),
        };
        let frame: Arc<str> = match serde_json::to_string(&frame) {
            Ok(frame) => frame.into(),
            Err(err) => {
                warn!(error = %err, "serializing notification frame failed");
                return 0;
            }
        };

        self.broadcast_frame(frame)
    }

    fn broadcast_frame(&self, frame: Arc<str>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.inner.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                match subscriber.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            subscriber_id = id,
                            username = %subscriber.claims.username,
                            "subscriber buffer full, dropping frame"
                        );
                        counter!(ROSTER_FANOUT_FRAMES_DROPPED_TOTAL).increment(1);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            self.remove(id);
        }

        delivered
    }
}
