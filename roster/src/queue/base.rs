use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::RosterResult;
use crate::types::{Command, Delivery, DeliveryId};

/// A queue of staff mutation commands.
///
/// Commands enqueued by one caller are delivered in the order they were enqueued. Nothing is
/// guaranteed across callers or across consumers running in parallel.
#[async_trait]
pub trait CommandQueue: fmt::Debug + Send + Sync {
    /// Accepts a command for later delivery.
    ///
    /// Returns once the command is stored, not once it is processed.
    async fn enqueue(&self, command: Command) -> RosterResult<DeliveryId>;

    /// Takes the oldest deliverable command, or `None` when there is nothing to do.
    async fn dequeue(&self) -> RosterResult<Option<Delivery>>;

    /// Removes a delivered command for good.
    async fn ack(&self, id: DeliveryId) -> RosterResult<()>;

    /// Hands a delivered command back to the queue and counts the failed attempt.
    async fn release(&self, id: DeliveryId) -> RosterResult<()>;

    /// Waits until new commands may be available or `timeout` elapses.
    async fn wait_for_commands(&self, timeout: Duration);

    /// Number of commands enqueued but not yet acknowledged.
    async fn pending(&self) -> RosterResult<u64>;
}
