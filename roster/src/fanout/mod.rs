//! Push fan-out of notifications to authenticated websocket subscribers.
//!
//! [`FanoutChannel`] is the registry of open subscribers and broadcasts serialized frames to
//! them. [`PushServer`] accepts websocket connections, authenticates them with a
//! [`crate::auth::TokenVerifier`] and registers them with the channel.

mod registry;
mod server;

pub use registry::{FanoutChannel, SubscriberId};
pub use server::{PushServer, PushServerHandle, SubscriberState};
