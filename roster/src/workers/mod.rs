//! Mutation workers draining the command queue.

pub mod base;
pub mod mutation;
pub mod pool;
