use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::error::{ErrorKind, RosterResult};
use crate::store::staff::StaffStore;
use crate::test_utils::notify::TimedNotify;
use crate::types::{NewStaff, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord};
use crate::bail;

type WriteCondition = Box<dyn Fn(u64) -> bool + Send + Sync>;

struct Inner {
    /// Write calls seen so far, failed ones included.
    writes: u64,
    failures_left: u64,
    panics_left: u64,
    conditions: Vec<(WriteCondition, Arc<Notify>)>,
}

impl Inner {
    fn check_conditions(&mut self) {
        let writes = self.writes;
        self.conditions.retain(|(condition, notify)| {
            let should_retain = !condition(writes);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// Staff store wrapper that can fail writes on demand and signal write counts.
#[derive(Clone)]
pub struct TestStaffStore<S> {
    wrapped: S,
    inner: Arc<Mutex<Inner>>,
}

impl<S: fmt::Debug> fmt::Debug for TestStaffStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStaffStore")
            .field("wrapped", &self.wrapped)
            .finish_non_exhaustive()
    }
}

impl<S> TestStaffStore<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            wrapped: store,
            inner: Arc::new(Mutex::new(Inner {
                writes: 0,
                failures_left: 0,
                panics_left: 0,
                conditions: Vec::new(),
            })),
        }
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    /// Makes the next `count` writes fail with [`ErrorKind::StoreQueryFailed`].
    pub async fn fail_next(&self, count: u64) {
        self.inner.lock().await.failures_left = count;
    }

    /// Makes the next `count` writes panic. A panicking write still counts as attempted.
    pub async fn panic_next(&self, count: u64) {
        self.inner.lock().await.panics_left = count;
    }

    pub async fn writes(&self) -> u64 {
        self.inner.lock().await.writes
    }

    /// Returns a notification fired once at least `count` writes were attempted.
    pub async fn notify_on_writes(&self, count: u64) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().await;
        inner
            .conditions
            .push((Box::new(move |writes| writes >= count), notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    /// Counts a write and decides whether it fails.
    async fn before_write(&self) -> RosterResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.panics_left > 0 {
            inner.panics_left -= 1;
            inner.writes += 1;
            inner.check_conditions();
            drop(inner);
            panic!("Injected store panic");
        }
        if inner.failures_left > 0 {
            inner.failures_left -= 1;
            bail!(ErrorKind::StoreQueryFailed, "Injected store failure");
        }

        Ok(())
    }

    async fn after_write(&self) {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        inner.check_conditions();
    }

    async fn write<T>(&self, result: impl Future<Output = RosterResult<T>>) -> RosterResult<T> {
        let result = match self.before_write().await {
            Ok(()) => result.await,
            Err(err) => Err(err),
        };
        self.after_write().await;

        result
    }
}

#[async_trait]
impl<S> StaffStore for TestStaffStore<S>
where
    S: StaffStore,
{
    async fn create(&self, staff: NewStaff) -> RosterResult<StaffRecord> {
        self.write(self.wrapped.create(staff)).await
    }

    async fn update_by_id(
        &self,
        id: StaffId,
        fields: StaffFields,
    ) -> RosterResult<Option<StaffRecord>> {
        self.write(self.wrapped.update_by_id(id, fields)).await
    }

    async fn delete_by_id(&self, id: StaffId) -> RosterResult<bool> {
        self.write(self.wrapped.delete_by_id(id)).await
    }

    async fn find(&self, query: &StaffQuery) -> RosterResult<Vec<StaffRecord>> {
        self.wrapped.find(query).await
    }

    async fn count(&self, filter: &StaffFilter) -> RosterResult<u64> {
        self.wrapped.count(filter).await
    }
}
