use async_trait::async_trait;
use roster_postgres::queue::{self as queries, COMMAND_QUEUE_CHANNEL, QueuedCommandRow};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, RosterError, RosterResult};
use crate::queue::CommandQueue;
use crate::types::{Command, CommandAction, Delivery, DeliveryId, StaffFields};
use crate::{bail, roster_error};

/// Pause before the listener retries after a failed receive.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

impl From<CommandAction> for queries::CommandAction {
    fn from(action: CommandAction) -> Self {
        match action {
            CommandAction::Insert => queries::CommandAction::Insert,
            CommandAction::Update => queries::CommandAction::Update,
            CommandAction::Delete => queries::CommandAction::Delete,
        }
    }
}

impl TryFrom<QueuedCommandRow> for Delivery {
    type Error = RosterError;

    fn try_from(row: QueuedCommandRow) -> Result<Self, Self::Error> {
        let fields = row
            .fields
            .map(serde_json::from_value::<StaffFields>)
            .transpose()?;

        let command = match (row.action, row.record_id) {
            (queries::CommandAction::Insert, _) => Command::Insert {
                fields: fields.unwrap_or_default(),
            },
            (queries::CommandAction::Update, Some(record_id)) => Command::Update {
                record_id,
                fields: fields.unwrap_or_default(),
            },
            (queries::CommandAction::Delete, Some(record_id)) => Command::Delete { record_id },
            (action, None) => bail!(
                ErrorKind::InvalidData,
                "Queued command has no record id",
                format!("{action:?} command {}", row.id)
            ),
        };

        Ok(Delivery {
            id: DeliveryId::new(row.id),
            command,
            attempts: u32::try_from(row.attempts).unwrap_or_default(),
        })
    }
}

/// Command queue backed by the `roster.command_queue` table.
///
/// Claimed rows stay in the table until acknowledged. A claim older than the visibility
/// timeout is treated as abandoned and the command becomes deliverable again. Enqueues notify
/// a Postgres channel so idle consumers wake up without waiting for their poll interval.
#[derive(Clone)]
pub struct PostgresCommandQueue {
    pool: PgPool,
    visibility_timeout: Duration,
    notify: Arc<Notify>,
    _listener: Arc<AbortOnDropHandle<()>>,
}

impl PostgresCommandQueue {
    /// Connects the wake-up listener and returns the queue.
    pub async fn connect(pool: PgPool, visibility_timeout: Duration) -> RosterResult<Self> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(COMMAND_QUEUE_CHANNEL).await?;

        let notify = Arc::new(Notify::new());
        let listener = tokio::spawn(listen_for_commands(listener, notify.clone()));

        Ok(Self {
            pool,
            visibility_timeout,
            notify,
            _listener: Arc::new(AbortOnDropHandle::new(listener)),
        })
    }
}

impl fmt::Debug for PostgresCommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCommandQueue")
            .field("visibility_timeout", &self.visibility_timeout)
            .finish_non_exhaustive()
    }
}

async fn listen_for_commands(mut listener: PgListener, notify: Arc<Notify>) {
    loop {
        match listener.recv().await {
            Ok(_) => notify.notify_one(),
            Err(err) => {
                warn!(error = %err, "command queue listener failed, retrying");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl CommandQueue for PostgresCommandQueue {
    async fn enqueue(&self, command: Command) -> RosterResult<DeliveryId> {
        let fields = command.fields().map(serde_json::to_value).transpose()?;

        let id = queries::enqueue_command(
            &self.pool,
            command.action().into(),
            command.record_id(),
            fields.as_ref(),
        )
        .await
        .map_err(|err| {
            roster_error!(
                ErrorKind::QueueAcceptFailed,
                "Command was not accepted by the queue",
                err,
                source: err
            )
        })?;

        Ok(DeliveryId::new(id))
    }

    async fn dequeue(&self) -> RosterResult<Option<Delivery>> {
        loop {
            let row = queries::claim_next_command(&self.pool, self.visibility_timeout.as_secs_f64())
                .await
                .map_err(|err| {
                    roster_error!(
                        ErrorKind::QueueDeliveryFailed,
                        "Claiming the next command failed",
                        err,
                        source: err
                    )
                })?;

            let Some(row) = row else {
                return Ok(None);
            };

            let id = row.id;
            match Delivery::try_from(row) {
                Ok(delivery) => return Ok(Some(delivery)),
                Err(err) => {
                    // Undecodable rows would be redelivered forever.
                    error!(delivery_id = id, error = %err, "dropping undecodable command");
                    queries::delete_command(&self.pool, id).await?;
                }
            }
        }
    }

    async fn ack(&self, id: DeliveryId) -> RosterResult<()> {
        if !queries::delete_command(&self.pool, id.into_inner()).await? {
            bail!(
                ErrorKind::InvalidState,
                "Acknowledged command is not in the queue",
                id
            );
        }

        Ok(())
    }

    async fn release(&self, id: DeliveryId) -> RosterResult<()> {
        if !queries::release_command(&self.pool, id.into_inner()).await? {
            bail!(
                ErrorKind::InvalidState,
                "Released command is not in the queue",
                id
            );
        }

        debug!(delivery_id = %id, "command released");
        self.notify.notify_one();

        Ok(())
    }

    async fn wait_for_commands(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    async fn pending(&self) -> RosterResult<u64> {
        let total = queries::count_commands(&self.pool).await?;

        u64::try_from(total).map_err(|err| {
            roster_error!(
                ErrorKind::ConversionError,
                "Negative queue length",
                total,
                source: err
            )
        })
    }
}
