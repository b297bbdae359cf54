use futures::FutureExt;
use metrics::counter;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested, wait_for_shutdown};
use crate::error::{ErrorKind, RosterError, RosterResult};
use crate::metrics::{ACTION_LABEL, OUTCOME_LABEL, ROSTER_COMMANDS_PROCESSED_TOTAL};
use crate::queue::CommandQueue;
use crate::roster_error;
use crate::store::staff::StaffStore;
use crate::types::{Command, Delivery, DeliveryId, NewStaff, StaffId};
use crate::workers::base::{Worker, WorkerHandle};

/// Result of applying one command to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Inserted(StaffId),
    Updated,
    Deleted,
    /// The targeted record does not exist. Not an error.
    NotFound,
}

/// What a worker did with a delivered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessOutcome {
    Applied,
    Noop,
    Failed,
    Retried,
}

impl ProcessOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Applied => "applied",
            ProcessOutcome::Noop => "noop",
            ProcessOutcome::Failed => "failed",
            ProcessOutcome::Retried => "retried",
        }
    }
}

impl From<CommandOutcome> for ProcessOutcome {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::NotFound => ProcessOutcome::Noop,
            _ => ProcessOutcome::Applied,
        }
    }
}

/// Applies a single command to `store`.
///
/// Updates only overwrite the fields present in the command. Updating or deleting a record
/// that does not exist yields [`CommandOutcome::NotFound`].
pub async fn apply_command(
    store: &dyn StaffStore,
    command: Command,
) -> RosterResult<CommandOutcome> {
    match command {
        Command::Insert { fields } => {
            let staff = NewStaff::try_from(fields)?;
            let record = store.create(staff).await?;

            Ok(CommandOutcome::Inserted(record.id))
        }
        Command::Update { record_id, fields } => {
            match store.update_by_id(record_id, fields).await? {
                Some(_) => Ok(CommandOutcome::Updated),
                None => Ok(CommandOutcome::NotFound),
            }
        }
        Command::Delete { record_id } => {
            if store.delete_by_id(record_id).await? {
                Ok(CommandOutcome::Deleted)
            } else {
                Ok(CommandOutcome::NotFound)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    noop: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time totals of a worker's processed commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub applied: u64,
    pub noop: u64,
    pub failed: u64,
    pub retried: u64,
}

impl MutationStats {
    /// Commands taken off the queue for good, whatever their outcome.
    pub fn completed(&self) -> u64 {
        self.applied + self.noop + self.failed
    }
}

impl std::ops::Add for MutationStats {
    type Output = MutationStats;

    fn add(self, other: MutationStats) -> MutationStats {
        MutationStats {
            applied: self.applied + other.applied,
            noop: self.noop + other.noop,
            failed: self.failed + other.failed,
            retried: self.retried + other.retried,
        }
    }
}

/// Shared view of a mutation worker's progress.
#[derive(Debug, Clone, Default)]
pub struct MutationWorkerState {
    counters: Arc<Counters>,
}

impl MutationWorkerState {
    pub fn stats(&self) -> MutationStats {
        MutationStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            noop: self.counters.noop.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: ProcessOutcome) {
        let counter = match outcome {
            ProcessOutcome::Applied => &self.counters.applied,
            ProcessOutcome::Noop => &self.counters.noop,
            ProcessOutcome::Failed => &self.counters.failed,
            ProcessOutcome::Retried => &self.counters.retried,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct MutationWorkerHandle {
    state: MutationWorkerState,
    handle: Option<JoinHandle<RosterResult<()>>>,
}

impl WorkerHandle<MutationWorkerState> for MutationWorkerHandle {
    fn state(&self) -> MutationWorkerState {
        self.state.clone()
    }

    async fn wait(mut self) -> RosterResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            roster_error!(
                ErrorKind::MutationWorkerPanic,
                "Mutation worker panicked",
                err
            )
        })?
    }
}

/// A consumer that takes commands off the queue and applies them to the staff store.
///
/// A failed command is released back to the queue while it has been attempted at most
/// `max_retries` times, and is otherwise logged and acknowledged, which discards it. The
/// worker checks for shutdown between commands, so the command in hand is always finished.
/// A command whose application panics is discarded as failed and the worker keeps going.
#[derive(Debug)]
pub struct MutationWorker {
    id: u16,
    store: Arc<dyn StaffStore>,
    queue: Arc<dyn CommandQueue>,
    max_retries: u32,
    poll_interval: Duration,
    shutdown_rx: ShutdownRx,
}

impl MutationWorker {
    pub fn new(
        id: u16,
        store: Arc<dyn StaffStore>,
        queue: Arc<dyn CommandQueue>,
        max_retries: u32,
        poll_interval: Duration,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            id,
            store,
            queue,
            max_retries,
            poll_interval,
            shutdown_rx,
        }
    }

    async fn run(mut self, state: MutationWorkerState) -> RosterResult<()> {
        info!("mutation worker started");

        loop {
            if is_shutdown_requested(&self.shutdown_rx) {
                break;
            }

            let delivery = match self.queue.dequeue().await {
                Ok(delivery) => delivery,
                Err(err) => {
                    error!(error = %err, "dequeue failed");
                    self.idle().await;
                    continue;
                }
            };

            match delivery {
                Some(delivery) => self.process(delivery, &state).await,
                None => self.idle().await,
            }
        }

        info!("mutation worker stopped");

        Ok(())
    }

    /// Waits for new commands, the poll interval or shutdown, whichever comes first.
    async fn idle(&mut self) {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut self.shutdown_rx) => {}
            _ = self.queue.wait_for_commands(self.poll_interval) => {}
        }
    }

    async fn process(&self, delivery: Delivery, state: &MutationWorkerState) {
        let Delivery {
            id: delivery_id,
            command,
            attempts,
        } = delivery;
        let action = command.action();
        let record_id = command.record_id();

        let applied = AssertUnwindSafe(apply_command(self.store.as_ref(), command))
            .catch_unwind()
            .await;

        let outcome = match applied {
            Ok(Ok(outcome)) => {
                info!(
                    %delivery_id,
                    %action,
                    ?record_id,
                    ?outcome,
                    "command applied"
                );
                self.ack(delivery_id).await;
                ProcessOutcome::from(outcome)
            }
            Ok(Err(err)) if attempts < self.max_retries => {
                warn!(
                    %delivery_id,
                    %action,
                    ?record_id,
                    attempts = attempts + 1,
                    error = %err,
                    "command failed, releasing for retry"
                );
                if let Err(err) = self.queue.release(delivery_id).await {
                    error!(%delivery_id, error = %err, "releasing command failed");
                }
                ProcessOutcome::Retried
            }
            Ok(Err(err)) => {
                error!(
                    %delivery_id,
                    %action,
                    ?record_id,
                    attempts = attempts + 1,
                    error = %err,
                    "command failed, discarding"
                );
                self.ack(delivery_id).await;
                ProcessOutcome::Failed
            }
            Err(panic) => {
                error!(
                    %delivery_id,
                    %action,
                    ?record_id,
                    panic = panic_message(&*panic),
                    "applying command panicked, discarding"
                );
                self.ack(delivery_id).await;
                ProcessOutcome::Failed
            }
        };

        state.record(outcome);
        counter!(
            ROSTER_COMMANDS_PROCESSED_TOTAL,
            ACTION_LABEL => action.as_str(),
            OUTCOME_LABEL => outcome.as_str()
        )
        .increment(1);
    }

    async fn ack(&self, delivery_id: DeliveryId) {
        match self.queue.ack(delivery_id).await {
            Ok(()) => debug!(%delivery_id, "command acknowledged"),
            // The command stays claimed and is redelivered after the visibility timeout.
            Err(err) => error!(%delivery_id, error = %err, "acknowledging command failed"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl Worker<MutationWorkerHandle, MutationWorkerState> for MutationWorker {
    type Error = RosterError;

    async fn start(self) -> RosterResult<MutationWorkerHandle> {
        let state = MutationWorkerState::default();
        let span = info_span!("mutation_worker", worker_id = self.id);
        let handle = tokio::spawn(self.run(state.clone()).instrument(span));

        Ok(MutationWorkerHandle {
            state,
            handle: Some(handle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::staff::memory::MemoryStaffStore;
    use crate::types::StaffFields;
    use uuid::Uuid;

    fn complete_fields() -> StaffFields {
        StaffFields {
            name: Some("Ada".to_string()),
            age: Some(36),
            position: Some("Engineer".to_string()),
            salary: Some(4_000_000.0),
        }
    }

    #[tokio::test]
    async fn update_is_a_sparse_patch() {
        let store = MemoryStaffStore::new();
        let CommandOutcome::Inserted(id) = apply_command(
            &store,
            Command::Insert {
                fields: complete_fields(),
            },
        )
        .await
        .unwrap() else {
            panic!("insert did not create a record");
        };

        let outcome = apply_command(
            &store,
            Command::Update {
                record_id: id,
                fields: StaffFields {
                    salary: Some(5_000_000.0),
                    ..StaffFields::default()
                },
            },
        )
        .await
        .unwrap();
        let record = store.get(id).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Updated);
        assert_eq!(record.salary, 5_000_000.0);
        assert_eq!(record.name, "Ada");
        assert_eq!(record.age, 36);
        assert_eq!(record.position, "Engineer");
    }

    #[tokio::test]
    async fn missing_records_are_not_errors() {
        let store = MemoryStaffStore::new();
        let record_id = Uuid::now_v7();

        let deleted = apply_command(&store, Command::Delete { record_id })
            .await
            .unwrap();
        let updated = apply_command(
            &store,
            Command::Update {
                record_id,
                fields: complete_fields(),
            },
        )
        .await
        .unwrap();

        assert_eq!(deleted, CommandOutcome::NotFound);
        assert_eq!(updated, CommandOutcome::NotFound);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn incomplete_insert_is_rejected() {
        let store = MemoryStaffStore::new();

        let err = apply_command(
            &store,
            Command::Insert {
                fields: StaffFields {
                    name: Some("Ada".to_string()),
                    ..StaffFields::default()
                },
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(store.records().await.is_empty());
    }
}
