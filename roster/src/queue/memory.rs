use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::bail;
use crate::error::{ErrorKind, RosterResult};
use crate::queue::CommandQueue;
use crate::types::{Command, Delivery, DeliveryId};

#[derive(Debug)]
struct Entry {
    command: Command,
    attempts: u32,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    ready: VecDeque<(DeliveryId, Entry)>,
    in_flight: HashMap<DeliveryId, Entry>,
}

/// Process-local command queue.
///
/// Commands are lost when the process exits, so only the in-process part of the at-least-once
/// contract holds: a released command is redelivered before any other.
#[derive(Debug, Clone, Default)]
pub struct MemoryCommandQueue {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl MemoryCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandQueue for MemoryCommandQueue {
    async fn enqueue(&self, command: Command) -> RosterResult<DeliveryId> {
        let id = {
            let mut inner = self.inner.lock().await;
            inner.next_id += 1;
            let id = DeliveryId::new(inner.next_id);
            inner.ready.push_back((
                id,
                Entry {
                    command,
                    attempts: 0,
                },
            ));
            id
        };

        self.notify.notify_one();

        Ok(id)
    }

    async fn dequeue(&self) -> RosterResult<Option<Delivery>> {
        let mut inner = self.inner.lock().await;
        let Some((id, entry)) = inner.ready.pop_front() else {
            return Ok(None);
        };

        let delivery = Delivery {
            id,
            command: entry.command.clone(),
            attempts: entry.attempts,
        };
        inner.in_flight.insert(id, entry);

        Ok(Some(delivery))
    }

    async fn ack(&self, id: DeliveryId) -> RosterResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.in_flight.remove(&id).is_none() {
            bail!(
                ErrorKind::InvalidState,
                "Acknowledged command is not in flight",
                id
            );
        }

        Ok(())
    }

    async fn release(&self, id: DeliveryId) -> RosterResult<()> {
        {
            let mut inner = self.inner.lock().await;
            let Some(mut entry) = inner.in_flight.remove(&id) else {
                bail!(
                    ErrorKind::InvalidState,
                    "Released command is not in flight",
                    id
                );
            };

            entry.attempts += 1;
            inner.ready.push_front((id, entry));
        }

        self.notify.notify_one();

        Ok(())
    }

    async fn wait_for_commands(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    async fn pending(&self) -> RosterResult<u64> {
        let inner = self.inner.lock().await;
        Ok((inner.ready.len() + inner.in_flight.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StaffFields;
    use uuid::Uuid;

    fn delete() -> Command {
        Command::Delete {
            record_id: Uuid::now_v7(),
        }
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let queue = MemoryCommandQueue::new();
        let first = delete();
        let second = Command::Insert {
            fields: StaffFields::default(),
        };
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        let a = queue.dequeue().await.unwrap().unwrap();
        let b = queue.dequeue().await.unwrap().unwrap();

        assert_eq!(a.command, first);
        assert_eq!(b.command, second);
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(queue.pending().await.unwrap(), 2);

        queue.ack(a.id).await.unwrap();
        queue.ack(b.id).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn released_commands_come_back_first_with_an_attempt_counted() {
        let queue = MemoryCommandQueue::new();
        queue.enqueue(delete()).await.unwrap();
        queue.enqueue(delete()).await.unwrap();

        let delivery = queue.dequeue().await.unwrap().unwrap();
        queue.release(delivery.id).await.unwrap();
        let redelivered = queue.dequeue().await.unwrap().unwrap();

        assert_eq!(redelivered.id, delivery.id);
        assert_eq!(redelivered.attempts, 1);
    }

    #[tokio::test]
    async fn double_ack_is_rejected() {
        let queue = MemoryCommandQueue::new();
        queue.enqueue(delete()).await.unwrap();
        let delivery = queue.dequeue().await.unwrap().unwrap();

        queue.ack(delivery.id).await.unwrap();
        let err = queue.ack(delivery.id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_consumer() {
        let queue = MemoryCommandQueue::new();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.wait_for_commands(Duration::from_secs(30)).await;
            })
        };

        queue.enqueue(delete()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
