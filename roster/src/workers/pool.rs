use roster_config::shared::QueueConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::RosterResult;
use crate::queue::CommandQueue;
use crate::store::staff::StaffStore;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::mutation::{MutationStats, MutationWorker, MutationWorkerHandle};

/// A fixed number of [`MutationWorker`]s sharing one queue and one store.
///
/// The pool is started once at startup. Workers stop when the shutdown signal fires, after
/// finishing the command they are processing.
#[derive(Debug)]
pub struct MutationWorkerPool {
    workers: Vec<MutationWorkerHandle>,
}

impl MutationWorkerPool {
    /// Starts `config.concurrency` workers.
    pub async fn start(
        config: &QueueConfig,
        store: Arc<dyn StaffStore>,
        queue: Arc<dyn CommandQueue>,
        shutdown_rx: ShutdownRx,
    ) -> RosterResult<Self> {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        let mut workers = Vec::with_capacity(usize::from(config.concurrency));
        for id in 0..config.concurrency {
            let worker = MutationWorker::new(
                id,
                store.clone(),
                queue.clone(),
                config.max_retries,
                poll_interval,
                shutdown_rx.clone(),
            );
            workers.push(worker.start().await?);
        }

        info!(
            concurrency = config.concurrency,
            max_retries = config.max_retries,
            "mutation worker pool started"
        );

        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Totals across every worker of the pool.
    pub fn stats(&self) -> MutationStats {
        self.workers
            .iter()
            .map(|worker| worker.state().stats())
            .fold(MutationStats::default(), |total, stats| total + stats)
    }

    /// Waits for every worker to exit.
    ///
    /// Worker failures are collected and returned together once all workers are done.
    pub async fn wait_all(self) -> RosterResult<()> {
        let mut errors = Vec::new();

        for (index, worker) in self.workers.into_iter().enumerate() {
            if let Err(err) = worker.wait().await {
                error!(worker_id = index, error = %err, "mutation worker exited with error");
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
