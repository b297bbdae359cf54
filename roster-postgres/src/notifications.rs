use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

/// A row of `roster.notifications`.
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PgRow> for NotificationRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(NotificationRow {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn insert_notification<'c, E>(
    executor: E,
    id: Uuid,
    title: &str,
    message: &str,
) -> Result<NotificationRow, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        insert into roster.notifications (id, title, message)
        values ($1, $2, $3)
        returning id, title, message, read, created_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(message)
    .fetch_one(executor)
    .await?;

    NotificationRow::try_from(row)
}

/// Returns the newest `limit` notifications, newest first.
pub async fn list_notifications<'c, E>(
    executor: E,
    limit: i64,
) -> Result<Vec<NotificationRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let rows = sqlx::query(
        r#"
        select id, title, message, read, created_at
        from roster.notifications
        order by created_at desc, id desc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(NotificationRow::try_from).collect()
}

/// Marks unread notifications as read and returns how many changed.
///
/// With `ids` set only those notifications are considered, otherwise every notification is.
pub async fn mark_notifications_read<'c, E>(
    executor: E,
    ids: Option<&[Uuid]>,
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let result = sqlx::query(
        r#"
        update roster.notifications
        set read = true
        where read = false and ($1::uuid[] is null or id = any($1))
        "#,
    )
    .bind(ids.map(<[Uuid]>::to_vec))
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
