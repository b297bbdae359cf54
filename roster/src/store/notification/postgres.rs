use async_trait::async_trait;
use roster_postgres::notifications::{self as queries, NotificationRow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RosterResult;
use crate::store::notification::NotificationStore;
use crate::types::{NotificationEvent, NotificationId};

impl From<NotificationRow> for NotificationEvent {
    fn from(row: NotificationRow) -> Self {
        NotificationEvent {
            id: row.id,
            title: row.title,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

/// Notification store backed by the `roster.notifications` table.
#[derive(Debug, Clone)]
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn insert(&self, title: &str, message: &str) -> RosterResult<NotificationEvent> {
        let row = queries::insert_notification(&self.pool, Uuid::now_v7(), title, message).await?;

        Ok(row.into())
    }

    async fn list_recent(&self, limit: u32) -> RosterResult<Vec<NotificationEvent>> {
        let rows = queries::list_notifications(&self.pool, i64::from(limit)).await?;

        Ok(rows.into_iter().map(NotificationEvent::from).collect())
    }

    async fn mark_read(&self, ids: Option<&[NotificationId]>) -> RosterResult<u64> {
        let ids = ids.filter(|ids| !ids.is_empty());

        Ok(queries::mark_notifications_read(&self.pool, ids).await?)
    }
}
