//! Core types for frame-bridge.
//!
//! This crate holds the wire contract shared by both endpoints (identities,
//! the request/response envelope, the handshake) and the in-process channel
//! transport they talk over. Endpoint behaviour lives in `framebridge-client`
//! and `framebridge-server`.

#![warn(missing_docs)]

mod channel;
mod identity;
mod message;
mod window;

pub use channel::{ChannelError, MessageChannel, MessagePort, PortReceiver};
pub use identity::{NodeId, NodeIdError};
pub use message::{ACK_ID, CONNECTED, ErrorPayload, HandshakeMessage, Message, Request, Response};
pub use window::{ANY_ORIGIN, MessageEvent, Subscription, SubscriptionHandle, Window, WindowProxy};

/// Per-request timeout used when the caller does not give one, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
