use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, watch};

use crate::bail;
use crate::error::{ErrorKind, RosterResult};
use crate::queue::CommandQueue;
use crate::queue::memory::MemoryCommandQueue;
use crate::test_utils::notify::TimedNotify;
use crate::types::{Command, Delivery, DeliveryId};

type EnqueueCondition = Box<dyn Fn(u64) -> bool + Send + Sync>;

#[derive(Default)]
struct Inner {
    enqueued: Vec<Command>,
    /// Enqueue calls started, including those blocked by a pause or rejected.
    attempts: u64,
    /// Remaining enqueues accepted before every further one is rejected.
    accept_limit: Option<u64>,
    conditions: Vec<(EnqueueCondition, Arc<Notify>)>,
}

impl Inner {
    fn check_conditions(&mut self) {
        let attempts = self.attempts;
        self.conditions.retain(|(condition, notify)| {
            let should_retain = !condition(attempts);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// Memory queue wrapper recording every accepted command.
///
/// Enqueues can be paused, which blocks them until [`RecordingQueue::resume`], or limited,
/// which rejects them with [`ErrorKind::QueueAcceptFailed`].
#[derive(Clone)]
pub struct RecordingQueue {
    queue: MemoryCommandQueue,
    inner: Arc<Mutex<Inner>>,
    paused: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for RecordingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingQueue")
            .field("queue", &self.queue)
            .field("paused", &*self.paused.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for RecordingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingQueue {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);

        Self {
            queue: MemoryCommandQueue::new(),
            inner: Arc::new(Mutex::new(Inner::default())),
            paused: Arc::new(paused),
        }
    }

    /// Commands accepted so far, in acceptance order.
    pub async fn enqueued(&self) -> Vec<Command> {
        self.inner.lock().await.enqueued.clone()
    }

    pub async fn attempts(&self) -> u64 {
        self.inner.lock().await.attempts
    }

    /// Accepts `count` more enqueues and rejects every one after.
    pub async fn accept_only(&self, count: u64) {
        self.inner.lock().await.accept_limit = Some(count);
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Returns a notification fired once at least `count` enqueues were attempted.
    pub async fn notify_on_attempts(&self, count: u64) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().await;
        inner
            .conditions
            .push((Box::new(move |attempts| attempts >= count), notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }
}

#[async_trait]
impl CommandQueue for RecordingQueue {
    async fn enqueue(&self, command: Command) -> RosterResult<DeliveryId> {
        {
            let mut inner = self.inner.lock().await;
            inner.attempts += 1;
            inner.check_conditions();
        }

        let mut paused = self.paused.subscribe();
        // The sender lives as long as `self`, so this only returns once resumed.
        let _ = paused.wait_for(|paused| !*paused).await;

        let mut inner = self.inner.lock().await;
        if let Some(limit) = inner.accept_limit.as_mut() {
            if *limit == 0 {
                bail!(ErrorKind::QueueAcceptFailed, "Injected queue rejection");
            }
            *limit -= 1;
        }

        let id = self.queue.enqueue(command.clone()).await?;
        inner.enqueued.push(command);

        Ok(id)
    }

    async fn dequeue(&self) -> RosterResult<Option<Delivery>> {
        self.queue.dequeue().await
    }

    async fn ack(&self, id: DeliveryId) -> RosterResult<()> {
        self.queue.ack(id).await
    }

    async fn release(&self, id: DeliveryId) -> RosterResult<()> {
        self.queue.release(id).await
    }

    async fn wait_for_commands(&self, timeout: Duration) {
        self.queue.wait_for_commands(timeout).await
    }

    async fn pending(&self) -> RosterResult<u64> {
        self.queue.pending().await
    }
}
