use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::RosterResult;
use crate::store::staff::StaffStore;
use crate::types::{
    NewStaff, SortOrder, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord,
    StaffSortField,
};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<StaffId, StaffRecord>,
}

/// Process-local staff store. Records are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStaffStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStaffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored record, in no particular order.
    pub async fn records(&self) -> Vec<StaffRecord> {
        let inner = self.inner.lock().await;
        inner.records.values().cloned().collect()
    }

    pub async fn get(&self, id: StaffId) -> Option<StaffRecord> {
        let inner = self.inner.lock().await;
        inner.records.get(&id).cloned()
    }
}

#[async_trait]
impl StaffStore for MemoryStaffStore {
    async fn create(&self, staff: NewStaff) -> RosterResult<StaffRecord> {
        let now = Utc::now();
        let record = StaffRecord {
            id: Uuid::now_v7(),
            name: staff.name,
            age: staff.age,
            position: staff.position,
            salary: staff.salary,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.lock().await;
        inner.records.insert(record.id, record.clone());

        Ok(record)
    }

    async fn update_by_id(
        &self,
        id: StaffId,
        fields: StaffFields,
    ) -> RosterResult<Option<StaffRecord>> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.records.get_mut(&id) else {
            return Ok(None);
        };

        record.apply_patch(fields, Utc::now());

        Ok(Some(record.clone()))
    }

    async fn delete_by_id(&self, id: StaffId) -> RosterResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.records.remove(&id).is_some())
    }

    async fn find(&self, query: &StaffQuery) -> RosterResult<Vec<StaffRecord>> {
        let inner = self.inner.lock().await;

        let mut matching: Vec<&StaffRecord> = inner
            .records
            .values()
            .filter(|record| query.filter.matches(record))
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare_by(query.sort, a, b).then_with(|| a.id.cmp(&b.id));
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);

        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &StaffFilter) -> RosterResult<u64> {
        let inner = self.inner.lock().await;
        let count = inner
            .records
            .values()
            .filter(|record| filter.matches(record))
            .count();

        Ok(count as u64)
    }
}

fn compare_by(field: StaffSortField, a: &StaffRecord, b: &StaffRecord) -> Ordering {
    match field {
        StaffSortField::Name => a.name.cmp(&b.name),
        StaffSortField::Age => a.age.cmp(&b.age),
        StaffSortField::Position => a.position.cmp(&b.position),
        StaffSortField::Salary => a.salary.total_cmp(&b.salary),
        StaffSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        StaffSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}
