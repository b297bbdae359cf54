//! Concurrency primitives shared by the worker pool and the push server.
//!
//! [`shutdown`] broadcasts a single stop signal to every long-running task. Tasks check it
//! between units of work, so a mutation worker finishes the command in hand and a push
//! connection finishes the frame it is writing before exiting.

pub mod shutdown;
