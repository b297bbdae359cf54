use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

/// A row of `roster.admins`.
#[derive(Debug, Clone)]
pub struct AdminRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgRow> for AdminRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(AdminRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn insert_admin<'c, E>(
    executor: E,
    id: Uuid,
    username: &str,
    email: &str,
    password_hash: &str,
    role: &str,
) -> Result<AdminRow, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        insert into roster.admins (id, username, email, password_hash, role)
        values ($1, $2, $3, $4, $5)
        returning id, username, email, password_hash, role, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(executor)
    .await?;

    AdminRow::try_from(row)
}

pub async fn find_admin_by_email<'c, E>(
    executor: E,
    email: &str,
) -> Result<Option<AdminRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        select id, username, email, password_hash, role, created_at, updated_at
        from roster.admins
        where email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await?;

    row.map(AdminRow::try_from).transpose()
}

pub async fn find_admin_by_username<'c, E>(
    executor: E,
    username: &str,
) -> Result<Option<AdminRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        select id, username, email, password_hash, role, created_at, updated_at
        from roster.admins
        where username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(executor)
    .await?;

    row.map(AdminRow::try_from).transpose()
}
