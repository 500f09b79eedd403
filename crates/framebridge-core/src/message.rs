//! Protocol messages.
//!
//! Requests and responses share one envelope, tagged on the wire by a `tag`
//! field. The handshake travels separately over the broad surface and is not
//! part of the envelope.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id carried by the handshake acknowledgment.
pub const ACK_ID: &str = "frame-bridge-init-ack";

/// Payload carried by the handshake acknowledgment.
pub const CONNECTED: &str = "frame-bridge-connected";

/// A message on a dedicated channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Message {
    /// A call from the initiator.
    #[serde(rename = "REQUEST")]
    Request(Request),
    /// An answer from the responder.
    #[serde(rename = "RESPONSE")]
    Response(Response),
}

impl Message {
    /// Decode a message copied off a port.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

/// A call to a named action on the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique among the initiator's in-flight calls.
    pub id: String,
    /// The calling initiator.
    pub source: NodeId,
    /// The responder expected to handle the call.
    pub destination: NodeId,
    /// Name of the action to run.
    pub action: String,
    /// Argument passed to the action.
    #[serde(default)]
    pub data: Value,
}

/// The answer to a [`Request`], or the handshake acknowledgment.
///
/// Exactly one of `data` and `error` is meaningful: a present `error` marks a
/// failure, otherwise the call succeeded with `data` (absent means `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request being answered.
    pub id: String,
    /// The answering responder.
    pub source: NodeId,
    /// The initiator that made the call.
    pub destination: NodeId,
    /// Result of a successful call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Response {
    /// A successful response.
    pub fn success(id: impl Into<String>, source: NodeId, destination: NodeId, data: Value) -> Self {
        Self {
            id: id.into(),
            source,
            destination,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(
        id: impl Into<String>,
        source: NodeId,
        destination: NodeId,
        error: ErrorPayload,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            destination,
            data: None,
            error: Some(error),
        }
    }

    /// The acknowledgment a responder sends once it has bound a peer.
    pub fn ack(source: NodeId, destination: NodeId) -> Self {
        Self::success(ACK_ID, source, destination, Value::from(CONNECTED))
    }

    /// Whether this is the handshake acknowledgment.
    pub fn is_ack(&self) -> bool {
        self.id == ACK_ID && self.data.as_ref().and_then(Value::as_str) == Some(CONNECTED)
    }

    /// Split into the success payload or the remote error.
    pub fn into_outcome(self) -> Result<Value, ErrorPayload> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }
}

/// A failure reported across the boundary.
///
/// This is the only shape errors take on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ErrorPayload {
    /// Human-readable description.
    pub message: String,
    /// Stack trace or cause chain, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    /// An error with no stack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Attach a stack trace or cause chain.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// The connection attempt an initiator posts to the responder's context,
/// alongside one transferred port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum HandshakeMessage {
    /// Request to bind the transferred port.
    #[serde(rename = "INIT", rename_all = "camelCase")]
    Init {
        /// Name the initiator claims.
        source_name: String,
    },
}

impl HandshakeMessage {
    /// The handshake an initiator named `source_name` sends.
    pub fn init(source_name: impl Into<String>) -> Self {
        HandshakeMessage::Init {
            source_name: source_name.into(),
        }
    }

    /// Name the initiator claims.
    pub fn source_name(&self) -> &str {
        match self {
            HandshakeMessage::Init { source_name } => source_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn request_wire_shape() {
        let msg = Message::from(Request {
            id: "1".into(),
            source: id("c"),
            destination: id("s"),
            action: "add".into(),
            data: json!({"a": 5, "b": 7}),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "tag": "REQUEST",
                "id": "1",
                "source": "c",
                "destination": "s",
                "action": "add",
                "data": {"a": 5, "b": 7},
            })
        );
    }

    #[test]
    fn failure_omits_data() {
        let msg = Message::from(Response::failure(
            "1",
            id("s"),
            id("c"),
            ErrorPayload::new("boom"),
        ));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "tag": "RESPONSE",
                "id": "1",
                "source": "s",
                "destination": "c",
                "error": {"message": "boom"},
            })
        );
    }

    #[test]
    fn missing_data_is_null_success() {
        let msg = Message::from_value(json!({
            "tag": "RESPONSE",
            "id": "7",
            "source": "s",
            "destination": "c",
        }))
        .unwrap();
        let Message::Response(response) = msg else {
            panic!("expected response");
        };
        assert_eq!(response.into_outcome(), Ok(Value::Null));
    }

    #[test]
    fn error_wins_over_data() {
        let mut response = Response::success("1", id("s"), id("c"), json!(3));
        response.error = Some(ErrorPayload::new("nope").with_stack("at handler"));
        let err = response.into_outcome().unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(err.stack.as_deref(), Some("at handler"));
    }

    #[test]
    fn ack_is_recognised() {
        let ack = Response::ack(id("s"), id("c"));
        assert!(ack.is_ack());
        let echoed = Response::success("x", id("s"), id("c"), json!(CONNECTED));
        assert!(!echoed.is_ack());
    }

    #[test]
    fn blank_source_is_rejected() {
        let result = Message::from_value(json!({
            "tag": "REQUEST",
            "id": "1",
            "source": "  ",
            "destination": "s",
            "action": "add",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn handshake_wire_shape() {
        let init = HandshakeMessage::init("demo-client");
        assert_eq!(
            serde_json::to_value(&init).unwrap(),
            json!({"tag": "INIT", "sourceName": "demo-client"})
        );
        let wrong: Result<HandshakeMessage, _> =
            serde_json::from_value(json!({"tag": "HELLO", "sourceName": "x"}));
        assert!(wrong.is_err());
    }
}
