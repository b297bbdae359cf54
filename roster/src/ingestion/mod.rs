//! Producers of mutation commands.
//!
//! [`CommandProducer`] enqueues already materialized batches one command per element, in
//! order. [`CsvIngestion`] streams a CSV upload through a bounded channel into fixed-size
//! batches, so memory stays bounded whatever the size of the upload.

mod producer;
mod upload;

pub use producer::CommandProducer;
pub use upload::{CsvIngestion, IngestionReport};
