//! Initiator endpoint for frame-bridge.
//!
//! The client opens a dedicated channel to a responder living in another
//! context, performs the handshake, and then issues correlated requests:
//!
//! ```no_run
//! # async fn demo(host: framebridge_core::Window, me: framebridge_core::Window) -> Result<(), framebridge_client::ClientError> {
//! use framebridge_client::{ClientConfig, init};
//! use std::time::Duration;
//!
//! let client = init(ClientConfig::new(
//!     host.reference_from(&me),
//!     "http://localhost:3000",
//!     "demo-client",
//!     "demo-server",
//! ))?;
//! client.wait_connected(Duration::from_secs(1)).await?;
//! let sum: i64 = client.request("add-numbers", serde_json::json!({"a": 5, "b": 7})).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod timer;

pub use client::{BridgeClient, ConnectionState, init};
pub use config::{ClientConfig, ClientSettings};
pub use error::ClientError;
pub use timer::Timer;
