//! Helpers for testing the pipeline against in-memory backends.
//!
//! - [`notify`]: timed waits so a test fails instead of hanging.
//! - [`staff_store`]: a staff store wrapper that injects failures and signals write counts.
//! - [`queue`]: a command queue wrapper that records, pauses or rejects enqueues.
//! - [`io`]: readers that count consumed bytes or fail mid-stream.
//! - [`auth`]: a token verifier with a fixed secret.

pub mod auth;
pub mod io;
pub mod notify;
pub mod queue;
pub mod staff_store;
