use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::RosterResult;
use crate::store::notification::NotificationStore;
use crate::types::{NotificationEvent, NotificationId};

#[derive(Debug, Default)]
struct Inner {
    /// Events in insertion order.
    events: Vec<NotificationEvent>,
}

/// Process-local notification store.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        let inner = self.inner.lock().await;
        inner.events.clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, title: &str, message: &str) -> RosterResult<NotificationEvent> {
        let event = NotificationEvent {
            id: Uuid::now_v7(),
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.lock().await;
        inner.events.push(event.clone());

        Ok(event)
    }

    async fn list_recent(&self, limit: u32) -> RosterResult<Vec<NotificationEvent>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .events
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, ids: Option<&[NotificationId]>) -> RosterResult<u64> {
        let ids = ids.filter(|ids| !ids.is_empty());
        let mut inner = self.inner.lock().await;

        let mut modified = 0;
        for event in inner.events.iter_mut().filter(|event| !event.read) {
            if ids.is_none_or(|ids| ids.contains(&event.id)) {
                event.read = true;
                modified += 1;
            }
        }

        Ok(modified)
    }
}
