use metrics::counter;
use std::sync::Arc;
use tracing::debug;

use crate::error::RosterResult;
use crate::metrics::{ACTION_LABEL, ROSTER_COMMANDS_ENQUEUED_TOTAL};
use crate::queue::CommandQueue;
use crate::types::{Command, DeliveryId, StaffFields, StaffId};

/// Enqueues commands on behalf of request handlers and the ingestion pipeline.
///
/// Every batch method enqueues sequentially in input order and stops at the first command the
/// queue does not accept. Commands enqueued before the failure stay queued.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    queue: Arc<dyn CommandQueue>,
}

impl CommandProducer {
    pub fn new(queue: Arc<dyn CommandQueue>) -> Self {
        Self { queue }
    }

    pub async fn enqueue(&self, command: Command) -> RosterResult<DeliveryId> {
        let action = command.action();
        let delivery_id = self.queue.enqueue(command).await?;

        counter!(ROSTER_COMMANDS_ENQUEUED_TOTAL, ACTION_LABEL => action.as_str()).increment(1);
        debug!(%delivery_id, %action, "command enqueued");

        Ok(delivery_id)
    }

    /// Enqueues one insert command per element and returns how many were queued.
    pub async fn enqueue_inserts(&self, batch: Vec<StaffFields>) -> RosterResult<usize> {
        let total = batch.len();
        for fields in batch {
            self.enqueue(Command::Insert { fields }).await?;
        }

        Ok(total)
    }

    pub async fn enqueue_updates(&self, batch: Vec<(StaffId, StaffFields)>) -> RosterResult<usize> {
        let total = batch.len();
        for (record_id, fields) in batch {
            self.enqueue(Command::Update { record_id, fields }).await?;
        }

        Ok(total)
    }

    pub async fn enqueue_deletes(&self, batch: Vec<StaffId>) -> RosterResult<usize> {
        let total = batch.len();
        for record_id in batch {
            self.enqueue(Command::Delete { record_id }).await?;
        }

        Ok(total)
    }
}
