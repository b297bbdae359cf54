//! Asynchronous staff-record mutation pipeline.
//!
//! Mutations are submitted as [`types::Command`]s to a [`queue::CommandQueue`] and applied to a
//! [`store::staff::StaffStore`] by a pool of [`workers::mutation::MutationWorker`]s. Bulk CSV
//! uploads are streamed into the queue by [`ingestion::CsvIngestion`] with bounded memory, and
//! every accepted batch produces a notification that [`fanout::FanoutChannel`] pushes to all
//! authenticated websocket subscribers.

pub mod auth;
pub mod concurrency;
pub mod error;
pub mod fanout;
pub mod ingestion;
mod macros;
pub mod metrics;
pub mod notification;
pub mod queue;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;
pub mod workers;
