use std::sync::Arc;
use tracing::debug;

use crate::error::RosterResult;
use crate::fanout::FanoutChannel;
use crate::store::notification::NotificationStore;
use crate::types::{NotificationId, NotificationPayload};

/// Persists notifications and pushes each new one to the fan-out channel.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    fanout: Option<FanoutChannel>,
}

impl NotificationService {
    /// Creates a service. Without a fan-out channel, notifications are only stored.
    pub fn new(store: Arc<dyn NotificationStore>, fanout: Option<FanoutChannel>) -> Self {
        Self { store, fanout }
    }

    /// Stores a new notification, broadcasts it and returns its external shape.
    ///
    /// Broadcasting is best effort and never fails the call.
    pub async fn create(&self, title: &str, message: &str) -> RosterResult<NotificationPayload> {
        let event = self.store.insert(title, message).await?;
        let payload = NotificationPayload::from(&event);

        if let Some(fanout) = &self.fanout {
            let delivered = fanout.publish(&payload);
            debug!(notification_id = %event.id, delivered, "notification published");
        }

        Ok(payload)
    }

    /// Returns the newest `limit` notifications, newest first.
    pub async fn list(&self, limit: u32) -> RosterResult<Vec<NotificationPayload>> {
        let events = self.store.list_recent(limit).await?;

        Ok(events.iter().map(NotificationPayload::from).collect())
    }

    /// Marks the given notifications as read, or all of them when `ids` is `None` or empty.
    ///
    /// Returns how many notifications changed.
    pub async fn mark_read(&self, ids: Option<&[NotificationId]>) -> RosterResult<u64> {
        self.store.mark_read(ids).await
    }
}
