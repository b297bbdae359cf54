use async_trait::async_trait;
use std::fmt;

use crate::error::RosterResult;
use crate::types::{AdminRecord, NewAdmin};

/// Storage of administrator accounts. Usernames and emails are unique.
#[async_trait]
pub trait AdminStore: fmt::Debug + Send + Sync {
    async fn find_by_email(&self, email: &str) -> RosterResult<Option<AdminRecord>>;

    async fn find_by_username(&self, username: &str) -> RosterResult<Option<AdminRecord>>;

    /// Creates an account with a fresh id and timestamps.
    ///
    /// Fails when the username or the email is already taken.
    async fn create(&self, admin: NewAdmin) -> RosterResult<AdminRecord>;
}
