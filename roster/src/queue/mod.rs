//! Command queue decoupling producers (HTTP handlers, ingestion) from the mutation workers.
//!
//! Delivery is at-least-once. A delivered command stays in the queue until it is acknowledged;
//! a consumer that crashes before acknowledging leaves it to be redelivered, so the same
//! command can be applied twice.

mod base;
pub mod memory;
pub mod postgres;

pub use base::CommandQueue;
