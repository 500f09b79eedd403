use framebridge_core::{ChannelError, ErrorPayload, NodeIdError};
use std::time::Duration;

/// Errors surfaced by [`BridgeClient`](crate::BridgeClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A request was issued before the responder acknowledged the handshake.
    #[error("bridge is not connected to the server frame")]
    NotConnected,
    /// No response arrived in time.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The client was torn down while the call was pending.
    #[error("client was destroyed")]
    Destroyed,
    /// The responder answered with an error.
    #[error(transparent)]
    Remote(ErrorPayload),
    /// A configured name is not a valid node id.
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] NodeIdError),
    /// The request payload could not be serialized.
    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),
    /// The result did not deserialize into the expected type.
    #[error("failed to decode response payload: {0}")]
    Decode(#[source] serde_json::Error),
    /// The underlying channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Settings are not valid TOML for [`ClientSettings`](crate::ClientSettings).
    #[error("invalid client settings: {0}")]
    Config(#[from] toml::de::Error),
    /// Settings file could not be read.
    #[error("failed to read client settings: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The remote error, if the responder reported one.
    pub fn remote(&self) -> Option<&ErrorPayload> {
        match self {
            ClientError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
