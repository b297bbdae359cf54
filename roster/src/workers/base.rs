use std::future::Future;

use crate::error::RosterResult;

/// A background worker.
///
/// Starting a worker spawns its task and returns a handle of type `H` exposing a state `S`.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    type Error;

    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle to a running worker.
pub trait WorkerHandle<S> {
    /// Returns the worker's state.
    ///
    /// The state stays readable after the worker exits.
    fn state(&self) -> S;

    /// Waits for the worker to exit and returns its result.
    fn wait(self) -> impl Future<Output = RosterResult<()>> + Send;
}
