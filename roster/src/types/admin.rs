use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type AdminId = Uuid;

/// A stored administrator account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRecord {
    pub id: AdminId,
    pub username: String,
    pub email: String,
    /// bcrypt hash, never the password itself.
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An administrator to create. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}
