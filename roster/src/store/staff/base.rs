use async_trait::async_trait;
use std::fmt;

use crate::error::RosterResult;
use crate::types::{NewStaff, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord};

/// Storage of staff records.
///
/// The mutation workers are the only writers. Implementations must be safe to call from many
/// workers at once; concurrent writes to the same record are resolved by whichever completes
/// last.
#[async_trait]
pub trait StaffStore: fmt::Debug + Send + Sync {
    /// Creates a record with a fresh id and timestamps.
    async fn create(&self, staff: NewStaff) -> RosterResult<StaffRecord>;

    /// Overwrites the fields present in `fields` and bumps `updated_at`.
    ///
    /// Returns `None` when no record has the given id.
    async fn update_by_id(
        &self,
        id: StaffId,
        fields: StaffFields,
    ) -> RosterResult<Option<StaffRecord>>;

    /// Removes a record, returning whether it existed.
    async fn delete_by_id(&self, id: StaffId) -> RosterResult<bool>;

    async fn find(&self, query: &StaffQuery) -> RosterResult<Vec<StaffRecord>>;

    async fn count(&self, filter: &StaffFilter) -> RosterResult<u64>;
}
