use async_trait::async_trait;
use std::fmt;

use crate::error::RosterResult;
use crate::types::{NotificationEvent, NotificationId};

/// Storage of notification events. Events are never deleted.
#[async_trait]
pub trait NotificationStore: fmt::Debug + Send + Sync {
    /// Persists a new unread event.
    async fn insert(&self, title: &str, message: &str) -> RosterResult<NotificationEvent>;

    /// Returns the newest `limit` events, newest first.
    async fn list_recent(&self, limit: u32) -> RosterResult<Vec<NotificationEvent>>;

    /// Marks unread events as read and returns how many changed.
    ///
    /// `None` or an empty slice targets every event.
    async fn mark_read(&self, ids: Option<&[NotificationId]>) -> RosterResult<u64>;
}
