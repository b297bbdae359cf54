use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, RosterResult};
use crate::store::admin::AdminStore;
use crate::types::{AdminRecord, NewAdmin};

/// Process-local admin store.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdminStore {
    admins: Arc<Mutex<Vec<AdminRecord>>>,
}

impl MemoryAdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admins(&self) -> Vec<AdminRecord> {
        self.admins.lock().await.clone()
    }
}

#[async_trait]
impl AdminStore for MemoryAdminStore {
    async fn find_by_email(&self, email: &str) -> RosterResult<Option<AdminRecord>> {
        let admins = self.admins.lock().await;

        Ok(admins.iter().find(|admin| admin.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RosterResult<Option<AdminRecord>> {
        let admins = self.admins.lock().await;

        Ok(admins.iter().find(|admin| admin.username == username).cloned())
    }

    async fn create(&self, admin: NewAdmin) -> RosterResult<AdminRecord> {
        let mut admins = self.admins.lock().await;
        if admins
            .iter()
            .any(|existing| existing.username == admin.username || existing.email == admin.email)
        {
            bail!(
                ErrorKind::InvalidData,
                "Admin already exists",
                detail = format!("username `{}` or email is taken", admin.username)
            );
        }

        let now = Utc::now();
        let record = AdminRecord {
            id: Uuid::now_v7(),
            username: admin.username,
            email: admin.email,
            password_hash: admin.password_hash,
            role: admin.role,
            created_at: now,
            updated_at: now,
        };
        admins.push(record.clone());

        Ok(record)
    }
}
