use async_trait::async_trait;
use roster_postgres::admins::{self as queries, AdminRow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RosterResult;
use crate::store::admin::AdminStore;
use crate::types::{AdminRecord, NewAdmin};

impl From<AdminRow> for AdminRecord {
    fn from(row: AdminRow) -> Self {
        AdminRecord {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Admin store backed by the `roster.admins` table.
#[derive(Debug, Clone)]
pub struct PostgresAdminStore {
    pool: PgPool,
}

impl PostgresAdminStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminStore for PostgresAdminStore {
    async fn find_by_email(&self, email: &str) -> RosterResult<Option<AdminRecord>> {
        let row = queries::find_admin_by_email(&self.pool, email).await?;

        Ok(row.map(AdminRecord::from))
    }

    async fn find_by_username(&self, username: &str) -> RosterResult<Option<AdminRecord>> {
        let row = queries::find_admin_by_username(&self.pool, username).await?;

        Ok(row.map(AdminRecord::from))
    }

    async fn create(&self, admin: NewAdmin) -> RosterResult<AdminRecord> {
        let row = queries::insert_admin(
            &self.pool,
            Uuid::now_v7(),
            &admin.username,
            &admin.email,
            &admin.password_hash,
            &admin.role,
        )
        .await?;

        Ok(row.into())
    }
}
