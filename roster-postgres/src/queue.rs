use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row, Type};
use uuid::Uuid;

/// Channel notified on every enqueue so idle consumers can wake up.
pub const COMMAND_QUEUE_CHANNEL: &str = "roster_command_queue";

/// Maps to the `roster.command_action` enum type.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq)]
#[sqlx(type_name = "roster.command_action", rename_all = "snake_case")]
pub enum CommandAction {
    Insert,
    Update,
    Delete,
}

/// A claimed row of `roster.command_queue`.
#[derive(Debug, Clone)]
pub struct QueuedCommandRow {
    pub id: i64,
    pub action: CommandAction,
    pub record_id: Option<Uuid>,
    pub fields: Option<serde_json::Value>,
    pub attempts: i32,
}

impl TryFrom<PgRow> for QueuedCommandRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(QueuedCommandRow {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            record_id: row.try_get("record_id")?,
            fields: row.try_get("fields")?,
            attempts: row.try_get("attempts")?,
        })
    }
}

/// Persists a command and notifies [`COMMAND_QUEUE_CHANNEL`] in the same transaction.
pub async fn enqueue_command(
    pool: &PgPool,
    action: CommandAction,
    record_id: Option<Uuid>,
    fields: Option<&serde_json::Value>,
) -> Result<i64, sqlx::Error> {
    let mut transaction = pool.begin().await?;

    let row = sqlx::query(
        r#"
        insert into roster.command_queue (action, record_id, fields)
        values ($1, $2, $3)
        returning id
        "#,
    )
    .bind(action)
    .bind(record_id)
    .bind(fields)
    .fetch_one(&mut *transaction)
    .await?;
    let id: i64 = row.try_get("id")?;

    sqlx::query("select pg_notify($1, '')")
        .bind(COMMAND_QUEUE_CHANNEL)
        .execute(&mut *transaction)
        .await?;

    transaction.commit().await?;

    Ok(id)
}

/// Claims the oldest deliverable command.
///
/// A command is deliverable when it was never claimed or when its claim is older than
/// `visibility_timeout_secs`. Rows locked by concurrent consumers are skipped.
pub async fn claim_next_command<'c, E>(
    executor: E,
    visibility_timeout_secs: f64,
) -> Result<Option<QueuedCommandRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        with next as (
            select id
            from roster.command_queue
            where claimed_at is null
               or claimed_at < now() - make_interval(secs => $1)
            order by id
            for update skip locked
            limit 1
        )
        update roster.command_queue q
        set claimed_at = now()
        from next
        where q.id = next.id
        returning q.id, q.action, q.record_id, q.fields, q.attempts
        "#,
    )
    .bind(visibility_timeout_secs)
    .fetch_optional(executor)
    .await?;

    row.map(QueuedCommandRow::try_from).transpose()
}

/// Removes a command for good.
pub async fn delete_command<'c, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let result = sqlx::query("delete from roster.command_queue where id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Drops the claim on a command and counts the failed attempt.
pub async fn release_command<'c, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let result = sqlx::query(
        r#"
        update roster.command_queue
        set claimed_at = null, attempts = attempts + 1
        where id = $1
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts commands that are queued or claimed but not yet acknowledged.
pub async fn count_commands<'c, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query("select count(*) as total from roster.command_queue")
        .fetch_one(executor)
        .await?;

    row.try_get("total")
}
