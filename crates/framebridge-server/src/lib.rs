//! Responder endpoint for frame-bridge.
//!
//! The server listens on its window for handshakes, checks the sender's
//! origin and declared name against static allow-lists, binds to the
//! transferred port, and answers requests by calling registered actions.
//! Handler failures and unknown actions come back to the caller as error
//! responses; nothing a handler does can take the dispatch loop down.

#![warn(missing_docs)]

mod actions;
mod config;
mod error;
mod server;

pub use actions::{Actions, Handler};
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{BridgeServer, init};
